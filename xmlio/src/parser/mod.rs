/*!
# Pull parser

The [`Tokenizer`] reads [`Token`]s from a [`Lexer`] and assembles them into
depth-tracked, namespace-resolved [`Event`]s. It is driven by calling
[`XmlReader::next`](crate::XmlReader::next); I/O happens synchronously inside
that call.

## Depth

The depth starts at zero. A [`Event::StartElement`] carries the new depth,
the matching [`Event::EndElement`] carries the same depth. The namespace
declarations of an element stay in scope until the call after its end event,
so that the context reported at the end event is still that of the element.

## Errors

All errors are fatal. After the first error, every call returns a clone of
that error without reading from the source again.
*/
use std::fmt;
use std::io;
use std::io::BufRead;

mod common;
mod namespaces;

pub use common::*;

use crate::context::Context;
use crate::encoding::DecodingReader;
use crate::error::*;
use crate::lexer::{Lexer, LexerOptions, Token};
use crate::namespaces::{NamespaceContext, NamespaceSnapshot, RcPtr};
use crate::reader::XmlReader;
use crate::strings::*;

use namespaces::NamespaceResolver;

/// Hold options to configure a [`Tokenizer`].
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
	/// Encoding to use instead of sniffing one, passed verbatim to the
	/// decoder.
	pub encoding: Option<String>,
	/// Tolerate whitespace around `=` and before the quote of the
	/// `encoding` pseudo-attribute while sniffing.
	pub relaxed: bool,
	/// Token limits of the lexer.
	///
	/// [`LexerOptions::max_token_length`] defaults to 8192 bytes. Text is
	/// split into several events at the limit; longer names, attribute
	/// values, comments, processing instructions and document type
	/// declarations fail with [`Error::RestrictedXml`].
	pub lexer: LexerOptions,
	/// Context to intern namespace names in; a fresh one is created if
	/// unset.
	pub context: Option<RcPtr<Context>>,
}

impl ReaderOptions {
	pub fn encoding<S: Into<String>>(mut self, name: S) -> Self {
		self.encoding = Some(name.into());
		self
	}

	pub fn relaxed(mut self, v: bool) -> Self {
		self.relaxed = v;
		self
	}

	/// Set the lexer options, e.g. to raise the token length limit:
	///
	/// ```
	/// use xmlio::{LexerOptions, ReaderOptions, Tokenizer, XmlReader};
	/// let opts = ReaderOptions::default().lexer(LexerOptions::default().max_token_length(1 << 20));
	/// let mut tok = Tokenizer::with_options(&b"<a/>"[..], opts);
	/// tok.next().unwrap();
	/// ```
	pub fn lexer(mut self, opts: LexerOptions) -> Self {
		self.lexer = opts;
		self
	}

	pub fn context(mut self, ctx: RcPtr<Context>) -> Self {
		self.context = Some(ctx);
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	/// Nothing has been reported yet.
	Initial,
	/// Before the document element.
	Prolog,
	/// Inside the document element.
	Root,
	/// After the document element.
	Epilog,
	End,
}

/**
# Namespace-aware XML 1.0 pull parser

```
use xmlio::{Event, Tokenizer, XmlReader};

let mut tok = Tokenizer::from_str("<?xml version='1.0'?><hello xmlns='urn:x'>World!</hello>");
assert!(matches!(tok.next().unwrap(), Event::StartDocument(..)));
match tok.next().unwrap() {
	Event::StartElement(m, name, ..) => {
		assert_eq!(m.depth(), 1);
		assert_eq!(name.namespace_str(), "urn:x");
		assert_eq!(name.local_name, "hello");
	},
	other => panic!("unexpected event: {:?}", other),
}
assert_eq!(tok.read_text().unwrap(), "World!");
assert!(matches!(tok.next().unwrap(), Event::EndDocument(..)));
```
*/
pub struct Tokenizer<R> {
	lexer: Lexer,
	src: R,
	state: State,
	resolver: NamespaceResolver,
	/// Raw and resolved names of the open elements
	open: Vec<(Name, QName)>,
	depth: usize,
	pending_pop: bool,
	pending_end: Option<Event>,
	lookahead: Option<Token>,
	seen_doctype: bool,
	current: Option<Event>,
	last_offset: usize,
	err: Option<Error>,
}

impl<R: BufRead> Tokenizer<R> {
	/// Create a tokenizer reading UTF-8 from `src`, with default options.
	pub fn new(src: R) -> Self {
		Self::with_options(src, ReaderOptions::default())
	}

	/// Create a tokenizer reading UTF-8 from `src`.
	///
	/// The encoding settings of the options are not used; see
	/// [`Tokenizer::from_bytes`] for input in other encodings.
	pub fn with_options(src: R, opts: ReaderOptions) -> Self {
		let ctx = match opts.context {
			Some(ctx) => ctx,
			None => RcPtr::new(Context::new()),
		};
		Self{
			lexer: Lexer::with_options(opts.lexer),
			src,
			state: State::Initial,
			resolver: NamespaceResolver::new(ctx),
			open: Vec::new(),
			depth: 0,
			pending_pop: false,
			pending_end: None,
			lookahead: None,
			seen_doctype: false,
			current: None,
			last_offset: 0,
			err: None,
		}
	}

	/// Return a reference to the source.
	pub fn get_ref(&self) -> &R {
		&self.src
	}

	/// Return the source, dropping all parser state.
	pub fn into_inner(self) -> R {
		self.src
	}

	/// The context namespace names are interned in.
	pub fn context(&self) -> &RcPtr<Context> {
		self.resolver.context()
	}

	fn metrics(&mut self) -> EventMetrics {
		let end = self.lexer.position().offset;
		let len = end - self.last_offset;
		self.last_offset = end;
		EventMetrics::new(len, self.depth)
	}

	fn read_token(&mut self) -> Result<Option<Token>> {
		if let Some(tok) = self.lookahead.take() {
			return Ok(Some(tok))
		}
		self.lexer.lex(&mut self.src)
	}

	fn require_token(&mut self, ctx: &'static str) -> Result<Token> {
		match self.read_token()? {
			Some(tok) => Ok(tok),
			None => Err(Error::wfeof(ctx, self.lexer.position())),
		}
	}

	fn unexpected(&self, ctx: &'static str, tok: &Token, expected: Option<&'static [&'static str]>) -> Error {
		Error::wf(WFError::UnexpectedToken(ctx, tok.name(), expected), self.lexer.position())
	}

	fn syntax(&self, msg: &'static str) -> Error {
		Error::wf(WFError::InvalidSyntax(msg), self.lexer.position())
	}

	/// Read `= value` after a name in an element header or the XML
	/// declaration.
	fn read_attribute_value(&mut self, ctx: &'static str) -> Result<CData> {
		match self.require_token(ctx)? {
			Token::Eq(_) => (),
			other => return Err(self.unexpected(ctx, &other, Some(&[Token::NAME_EQ]))),
		}
		match self.require_token(ctx)? {
			Token::AttributeValue(_, value) => Ok(value),
			other => Err(self.unexpected(ctx, &other, Some(&[Token::NAME_ATTRIBUTEVALUE]))),
		}
	}

	fn read_xml_decl(&mut self) -> Result<XmlDeclaration> {
		let mut version = None;
		let mut encoding = None;
		let mut standalone = None;
		loop {
			let name = match self.require_token(ERRCTX_XML_DECL)? {
				Token::XMLDeclEnd(_) => break,
				Token::Name(_, name) => name,
				other => return Err(self.unexpected(ERRCTX_XML_DECL, &other, Some(&[Token::NAME_NAME, Token::NAME_XMLDECLEND]))),
			};
			let value = self.read_attribute_value(ERRCTX_XML_DECL)?;
			match name.as_str() {
				"version" if version.is_none() => {
					if value != "1.0" {
						return Err(self.syntax("only XML version 1.0 is supported"))
					}
					version = Some(XMLVersion::V1_0);
				},
				"encoding" if version.is_some() && encoding.is_none() && standalone.is_none() => {
					let valid = value.starts_with(|c: char| c.is_ascii_alphabetic())
						&& value.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
					if !valid {
						return Err(self.syntax("invalid encoding name"))
					}
					encoding = Some(value);
				},
				"standalone" if version.is_some() && standalone.is_none() => {
					standalone = Some(match value.as_str() {
						"yes" => true,
						"no" => false,
						_ => return Err(self.syntax("standalone must be 'yes' or 'no'")),
					});
				},
				_ => return Err(self.syntax("unexpected or misplaced pseudo-attribute in XML declaration")),
			}
		}
		match version {
			Some(version) => Ok(XmlDeclaration{version, encoding, standalone}),
			None => Err(self.syntax("XML declaration without version")),
		}
	}

	fn start_document(&mut self) -> Result<Event> {
		self.state = State::Prolog;
		match self.read_token()? {
			Some(Token::XMLDeclStart(_)) => {
				let decl = self.read_xml_decl()?;
				Ok(Event::StartDocument(self.metrics(), Some(decl)))
			},
			other => {
				self.lookahead = other;
				Ok(Event::StartDocument(EventMetrics::new(0, 0), None))
			},
		}
	}

	fn start_element(&mut self, name: Name) -> Result<Event> {
		let mut attributes = Vec::new();
		let empty = loop {
			match self.require_token(ERRCTX_ELEMENT)? {
				Token::ElementHFEnd(_) => break false,
				Token::ElementHeadClose(_) => break true,
				Token::Name(_, attr) => {
					let value = self.read_attribute_value(ERRCTX_ELEMENT)?;
					attributes.push((attr, value));
				},
				other => return Err(self.unexpected(ERRCTX_ELEMENT, &other, Some(&[Token::NAME_NAME, Token::NAME_ELEMENTHFEND, Token::NAME_ELEMENTHEADCLOSE]))),
			}
		};
		let pos = self.lexer.position();
		let (qname, attributes, declarations) = self.resolver.start_element(name.clone(), attributes, pos)?;
		self.depth += 1;
		self.state = State::Root;
		let metrics = self.metrics();
		if empty {
			self.pending_end = Some(Event::EndElement(EventMetrics::new(0, self.depth), qname.clone()));
		} else {
			self.open.push((name, qname.clone()));
		}
		Ok(Event::StartElement(metrics, qname, attributes, declarations))
	}

	fn end_element(&mut self, name: Name) -> Result<Event> {
		match self.require_token(ERRCTX_ELEMENT_FOOT)? {
			Token::ElementHFEnd(_) => (),
			other => return Err(self.unexpected(ERRCTX_ELEMENT_FOOT, &other, Some(&[Token::NAME_ELEMENTHFEND]))),
		}
		let qname = match self.open.pop() {
			Some((open, qname)) if open == name => qname,
			_ => return Err(Error::wf(WFError::ElementMismatch, self.lexer.position())),
		};
		self.pending_pop = true;
		Ok(Event::EndElement(self.metrics(), qname))
	}

	fn outside_ctx(&self) -> &'static str {
		match self.state {
			State::Epilog | State::End => ERRCTX_DOCEND,
			_ => ERRCTX_DOCBEGIN,
		}
	}

	fn read_event(&mut self) -> Result<Event> {
		if self.pending_pop {
			self.pending_pop = false;
			self.resolver.end_element();
			self.depth -= 1;
			if self.depth == 0 {
				self.state = State::Epilog;
			}
		}
		if let Some(ev) = self.pending_end.take() {
			self.pending_pop = true;
			return Ok(ev)
		}
		match self.state {
			State::Initial => return self.start_document(),
			State::End => return Ok(Event::EndDocument(EventMetrics::new(0, 0))),
			_ => (),
		}
		let in_root = self.state == State::Root;
		let tok = match self.read_token()? {
			Some(tok) => tok,
			None => {
				if self.state != State::Epilog {
					let ctx = if in_root { ERRCTX_TEXT } else { ERRCTX_DOCBEGIN };
					return Err(Error::wfeof(ctx, self.lexer.position()))
				}
				self.state = State::End;
				return Ok(Event::EndDocument(self.metrics()))
			},
		};
		match tok {
			Token::Text(_, text) if in_root => Ok(Event::Text(self.metrics(), text)),
			Token::Text(_, text) => {
				if !xmlio_validation::is_xml_whitespace(&text) {
					return Err(Error::wf(WFError::UnexpectedToken(self.outside_ctx(), Token::NAME_TEXT, None), self.lexer.position()))
				}
				Ok(Event::IgnorableWhitespace(self.metrics(), text))
			},
			Token::CDataSection(_, text) if in_root => Ok(Event::CData(self.metrics(), text)),
			Token::Comment(_, text) => Ok(Event::Comment(self.metrics(), text)),
			Token::ProcessingInstruction(_, target, data) => Ok(Event::ProcessingInstruction(self.metrics(), target, data)),
			Token::Doctype(_, text) if self.state == State::Prolog && !self.seen_doctype => {
				self.seen_doctype = true;
				Ok(Event::DoctypeDecl(self.metrics(), text))
			},
			Token::ElementHeadStart(_, name) if self.state != State::Epilog => self.start_element(name),
			Token::ElementFootStart(_, name) if in_root => self.end_element(name),
			other => {
				let ctx = if in_root { ERRCTX_TEXT } else { self.outside_ctx() };
				Err(self.unexpected(ctx, &other, None))
			},
		}
	}
}

impl<'a> Tokenizer<&'a [u8]> {
	/// Create a tokenizer over a string.
	pub fn from_str(s: &'a str) -> Self {
		Self::new(s.as_bytes())
	}
}

impl<R: io::Read> Tokenizer<DecodingReader<R>> {
	/// Create a tokenizer over raw bytes in any supported encoding.
	///
	/// The encoding is taken from the options or sniffed from the start of
	/// the input. Errors in the encoding declaration are reported here,
	/// before any event.
	pub fn from_bytes(src: R, opts: ReaderOptions) -> Result<Self> {
		let reader = DecodingReader::sniff(src, opts.encoding.as_deref(), opts.relaxed)?;
		Ok(Self::with_options(reader, opts))
	}

	/// Name of the encoding the input is decoded from.
	pub fn encoding(&self) -> &str {
		self.src.encoding()
	}
}

impl<R: BufRead> XmlReader for Tokenizer<R> {
	fn next(&mut self) -> Result<Event> {
		if let Some(e) = self.err.as_ref() {
			return Err(e.clone())
		}
		match self.read_event() {
			Ok(ev) => {
				self.current = Some(ev.clone());
				Ok(ev)
			},
			Err(e) => Err(self.poison(e)),
		}
	}

	fn current(&self) -> Option<&Event> {
		self.current.as_ref()
	}

	fn depth(&self) -> usize {
		self.depth
	}

	fn namespace_context(&self) -> NamespaceSnapshot {
		NamespaceSnapshot::root(self.resolver.stack().bindings())
	}

	fn position(&self) -> Position {
		self.lexer.position()
	}

	fn poison(&mut self, err: Error) -> Error {
		if self.err.is_none() {
			log::debug!("tokenizer failed at {}: {}", self.lexer.position(), err);
			self.err = Some(err.clone());
		}
		err
	}
}

impl<R> fmt::Debug for Tokenizer<R> {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Tokenizer")
			.field("lexer", &self.lexer)
			.field("state", &self.state)
			.field("depth", &self.depth)
			.field("err", &self.err)
			.finish()
	}
}
