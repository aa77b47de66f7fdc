/*!
# XML 1.0 Lexer

The lexer turns a UTF-8 byte stream into [`Token`]s. It pulls bytes from a
[`std::io::BufRead`] and blocks inside the call which needs more data, so a
single call to [`Lexer::lex`] always returns a complete token, the end of
the stream or an error.

References are expanded, line endings are folded and attribute value
whitespace is normalized here, so that the parser only ever sees final
character data.
*/
use std::convert::TryFrom;
use std::fmt;
use std::io;
use std::io::BufRead;

mod ranges;
mod read;

use xmlio_validation::selectors::{CharSelector, CLASS_XML_CHAR};
use xmlio_validation::{validate_pi_target, Error as ValidationError};

use crate::error::*;
use crate::strings::{CData, Name};
use ranges::*;
use read::{count_matching, utf8_missing, Endbyte};

/// Carry information about where in the stream the token was observed
///
/// Tokens are not necessarily consecutive: whitespace inside element headers
/// and the XML declaration does not produce tokens.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct TokenMetrics {
	start: usize,
	end: usize,
}

impl TokenMetrics {
	pub const fn new(start: usize, end: usize) -> TokenMetrics {
		TokenMetrics{start, end}
	}

	/// Number of input bytes the token was built from.
	pub fn len(&self) -> usize {
		self.end - self.start
	}

	/// Offset of the first byte of the token.
	pub fn start(&self) -> usize {
		self.start
	}

	/// Offset of the byte after the token.
	pub fn end(&self) -> usize {
		self.end
	}
}

/**
A single XML token

Tokens map to pieces of markup, not to XML concepts: an element header is
a [`Token::ElementHeadStart`] followed by any number of `Name`, `Eq` and
`AttributeValue` tokens and either [`Token::ElementHFEnd`] or
[`Token::ElementHeadClose`].
*/
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
	/// A freestanding XML `Name` inside an element header or the XML
	/// declaration.
	Name(TokenMetrics, Name),

	/// An equal sign inside an element header or the XML declaration.
	Eq(TokenMetrics),

	/// An attribute value, without the delimiters and with references
	/// expanded.
	AttributeValue(TokenMetrics, CData),

	/// The `<?xml` sequence at the very start of a document.
	XMLDeclStart(TokenMetrics),

	/// The `?>` sequence ending the XML declaration.
	XMLDeclEnd(TokenMetrics),

	/// The `/>` sequence.
	ElementHeadClose(TokenMetrics),

	/// The `>` ending an element header or footer.
	ElementHFEnd(TokenMetrics),

	/// `<` followed by the element name.
	ElementHeadStart(TokenMetrics, Name),

	/// `</` followed by the element name.
	ElementFootStart(TokenMetrics, Name),

	/// Character data outside of CDATA sections.
	///
	/// Long runs of text are split into several tokens.
	Text(TokenMetrics, CData),

	/// The contents of a CDATA section.
	///
	/// Long sections are split into several tokens.
	CDataSection(TokenMetrics, CData),

	/// The contents of a comment.
	Comment(TokenMetrics, CData),

	/// A processing instruction target and its (possibly empty) data.
	ProcessingInstruction(TokenMetrics, Name, CData),

	/// The verbatim text between `<!DOCTYPE` and the closing `>`.
	Doctype(TokenMetrics, CData),
}

impl Token {
	pub const NAME_NAME: &'static str = "Name";
	pub const NAME_EQ: &'static str = "'='";
	pub const NAME_ATTRIBUTEVALUE: &'static str = "AttValue";
	pub const NAME_XMLDECLSTART: &'static str = "'<?xml'";
	pub const NAME_XMLDECLEND: &'static str = "'?>'";
	pub const NAME_ELEMENTHEADCLOSE: &'static str = "'/>'";
	pub const NAME_ELEMENTHFEND: &'static str = "'>'";
	pub const NAME_ELEMENTHEADSTART: &'static str = "'<'";
	pub const NAME_ELEMENTFOOTSTART: &'static str = "'</'";
	pub const NAME_TEXT: &'static str = "Text";
	pub const NAME_CDATASECTION: &'static str = "CDATA section";
	pub const NAME_COMMENT: &'static str = "Comment";
	pub const NAME_PI: &'static str = "PI";
	pub const NAME_DOCTYPE: &'static str = "doctypedecl";

	/// Short human readable description of the token type, for error
	/// messages.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Name(..) => Self::NAME_NAME,
			Self::Eq(..) => Self::NAME_EQ,
			Self::AttributeValue(..) => Self::NAME_ATTRIBUTEVALUE,
			Self::XMLDeclStart(..) => Self::NAME_XMLDECLSTART,
			Self::XMLDeclEnd(..) => Self::NAME_XMLDECLEND,
			Self::ElementHeadClose(..) => Self::NAME_ELEMENTHEADCLOSE,
			Self::ElementHFEnd(..) => Self::NAME_ELEMENTHFEND,
			Self::ElementHeadStart(..) => Self::NAME_ELEMENTHEADSTART,
			Self::ElementFootStart(..) => Self::NAME_ELEMENTFOOTSTART,
			Self::Text(..) => Self::NAME_TEXT,
			Self::CDataSection(..) => Self::NAME_CDATASECTION,
			Self::Comment(..) => Self::NAME_COMMENT,
			Self::ProcessingInstruction(..) => Self::NAME_PI,
			Self::Doctype(..) => Self::NAME_DOCTYPE,
		}
	}

	pub fn metrics(&self) -> &TokenMetrics {
		match self {
			Self::Name(m, ..) => m,
			Self::Eq(m) => m,
			Self::AttributeValue(m, ..) => m,
			Self::XMLDeclStart(m) => m,
			Self::XMLDeclEnd(m) => m,
			Self::ElementHeadClose(m) => m,
			Self::ElementHFEnd(m) => m,
			Self::ElementHeadStart(m, ..) => m,
			Self::ElementFootStart(m, ..) => m,
			Self::Text(m, ..) => m,
			Self::CDataSection(m, ..) => m,
			Self::Comment(m, ..) => m,
			Self::ProcessingInstruction(m, ..) => m,
			Self::Doctype(m, ..) => m,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
	Header,
	Footer,
	XMLDecl,
}

impl ElementKind {
	fn errctx(&self) -> &'static str {
		match self {
			Self::Header => ERRCTX_ELEMENT,
			Self::Footer => ERRCTX_ELEMENT_FOOT,
			Self::XMLDecl => ERRCTX_XML_DECL,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Content,
	/// Inside an element header, footer or the XML declaration.
	///
	/// `need_space` is set after an attribute value, where the next name
	/// must be separated by whitespace.
	Element{kind: ElementKind, need_space: bool},
	CDataSection,
	Eof,
}

/// Hold options to configure a [`Lexer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerOptions {
	/// Maximum number of bytes which can form a token.
	///
	/// Text and CDATA section tokens exceeding the limit are split and
	/// emitted in parts. All other tokens exceeding it fail with
	/// [`Error::RestrictedXml`].
	pub max_token_length: usize,
}

impl LexerOptions {
	/// Set the [`LexerOptions::max_token_length`] value.
	///
	/// # Example
	///
	/// ```
	/// use xmlio::{Lexer, LexerOptions};
	/// let mut lexer = Lexer::with_options(LexerOptions::default().max_token_length(1024));
	/// ```
	pub fn max_token_length(mut self, v: usize) -> LexerOptions {
		self.max_token_length = v;
		self
	}
}

impl Default for LexerOptions {
	fn default() -> Self {
		Self{
			max_token_length: 8192,
		}
	}
}

fn resolve_named_entity(name: &[u8]) -> Option<u8> {
	match name {
		b"amp" => Some(b'&'),
		b"lt" => Some(b'<'),
		b"gt" => Some(b'>'),
		b"apos" => Some(b'\''),
		b"quot" => Some(b'"'),
		_ => None,
	}
}

/**
# Restricted XML 1.0 lexer

The lexer keeps the position in the input, the lexing state between tokens
and a scratchpad for the token being built. Errors are fatal: after the
first error, every call returns a clone of it.

Besides whitespace, the lexer drops a UTF-8 byte order mark at the start of
the input.
*/
pub struct Lexer {
	state: State,
	scratchpad: Vec<u8>,
	/// Bytes held back from a split token
	carry: Vec<u8>,
	opts: LexerOptions,
	pos: Position,
	token_start: usize,
	at_start: bool,
	err: Option<Error>,
}

impl Lexer {
	/// Construct a new Lexer with default options
	pub fn new() -> Lexer {
		Self::with_options(LexerOptions::default())
	}

	/// Construct a new Lexer with the given options
	pub fn with_options(opts: LexerOptions) -> Lexer {
		Lexer{
			state: State::Content,
			scratchpad: Vec::new(),
			carry: Vec::new(),
			opts,
			pos: Position::START,
			token_start: 0,
			at_start: true,
			err: None,
		}
	}

	/// Position of the next byte to be read.
	pub fn position(&self) -> Position {
		self.pos
	}

	/// Return true if the lexer failed or reached the end of the input.
	pub fn is_done(&self) -> bool {
		self.err.is_some() || self.state == State::Eof
	}

	/// Lex the next token from the reader.
	///
	/// Returns `Ok(None)` once the input ended outside of any markup. An end
	/// of input inside markup is an error.
	pub fn lex<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Option<Token>> {
		if let Some(e) = self.err.as_ref() {
			return Err(e.clone())
		}
		match self.lex_token(r) {
			Ok(tok) => Ok(tok),
			Err(e) => {
				self.err = Some(e.clone());
				Err(e)
			}
		}
	}

	fn lex_token<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Option<Token>> {
		if self.at_start {
			self.skip_bom(r)?;
		}
		self.token_start = self.pos.offset;
		self.scratchpad.clear();
		let tok = match self.state {
			State::Eof => return Ok(None),
			State::Content => self.lex_content(r)?,
			State::Element{kind, need_space} => Some(self.lex_element(r, kind, need_space)?),
			State::CDataSection => {
				self.scratchpad.extend_from_slice(&self.carry);
				self.carry.clear();
				Some(self.lex_cdata_section(r)?)
			},
		};
		self.at_start = false;
		Ok(tok)
	}

	fn metrics(&self) -> TokenMetrics {
		TokenMetrics::new(self.token_start, self.pos.offset)
	}

	fn wf(&self, e: WFError) -> Error {
		Error::wf(e, self.pos)
	}

	fn eof(&self, ctx: &'static str) -> Error {
		Error::wfeof(ctx, self.pos)
	}

	fn restricted(&self, msg: &'static str) -> Error {
		Error::RestrictedXml(msg, self.pos)
	}

	fn peek_byte<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Option<u8>> {
		loop {
			match r.fill_buf() {
				Ok(buf) => return Ok(buf.first().copied()),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(Error::io(e).at(self.pos)),
			}
		}
	}

	fn next_byte<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Option<u8>> {
		let b = self.peek_byte(r)?;
		if let Some(b) = b {
			self.pos.advance(&[b]);
			r.consume(1);
		}
		Ok(b)
	}

	fn require_byte<R: BufRead + ?Sized>(&mut self, r: &mut R, ctx: &'static str) -> Result<u8> {
		match self.next_byte(r)? {
			Some(b) => Ok(b),
			None => Err(self.eof(ctx)),
		}
	}

	fn expect_literal<R: BufRead + ?Sized>(&mut self, r: &mut R, lit: &'static [u8], ctx: &'static str, expected: &'static [&'static str]) -> Result<()> {
		for want in lit {
			let b = self.require_byte(r, ctx)?;
			if b != *want {
				return Err(self.wf(WFError::UnexpectedByte(ctx, b, Some(expected))))
			}
		}
		Ok(())
	}

	/// Consume bytes matched by the selector.
	///
	/// If `keep` is set, the bytes are appended to the scratchpad until it
	/// holds `limit` bytes.
	fn scan<R: BufRead + ?Sized, B: ByteSelect>(&mut self, r: &mut R, selector: &B, limit: usize, keep: bool) -> Result<Endbyte> {
		loop {
			let (consumed, end) = match r.fill_buf() {
				Ok(buf) => {
					if buf.len() == 0 {
						return Ok(Endbyte::Eof)
					}
					let matching = count_matching(buf, selector);
					let n = if keep {
						matching.min(limit.saturating_sub(self.scratchpad.len()))
					} else {
						matching
					};
					let taken = &buf[..n];
					if keep {
						self.scratchpad.extend_from_slice(taken);
					}
					self.pos.advance(taken);
					let end = if n < matching {
						Some(Endbyte::Limit)
					} else if n < buf.len() {
						Some(Endbyte::Delimiter(buf[n]))
					} else {
						None
					};
					(n, end)
				},
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(Error::io(e).at(self.pos)),
			};
			r.consume(consumed);
			if let Some(end) = end {
				return Ok(end)
			}
		}
	}

	fn skip_space<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<usize> {
		let before = self.pos.offset;
		self.scan(r, &CLASS_XML_SPACE_BYTE, usize::MAX, false)?;
		Ok(self.pos.offset - before)
	}

	fn skip_bom<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<()> {
		if self.peek_byte(r)? != Some(0xef) {
			return Ok(())
		}
		self.expect_literal(r, b"\xef\xbb\xbf", ERRCTX_DOCBEGIN, &["byte order mark"])?;
		// the mark is not part of the first line
		self.pos.column = 1;
		Ok(())
	}

	/// Read continuation bytes until the scratchpad ends on a char
	/// boundary.
	fn complete_utf8_tail<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<()> {
		while utf8_missing(&self.scratchpad) > 0 {
			match self.peek_byte(r)? {
				Some(b) if b & 0xc0 == 0x80 => {
					self.next_byte(r)?;
					self.scratchpad.push(b);
				},
				_ => break,
			}
		}
		Ok(())
	}

	fn fold_cr<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<()> {
		if self.peek_byte(r)? == Some(b'\n') {
			self.next_byte(r)?;
		}
		Ok(())
	}

	fn scratchpad_str(&self) -> Result<&str> {
		std::str::from_utf8(&self.scratchpad).map_err(|_| Error::Encoding(EncodingError::Malformed("UTF-8")))
	}

	fn finish_cdata(&mut self, ctx: &'static str) -> Result<CData> {
		let pos = self.pos;
		let result = CData::try_from(self.scratchpad_str()?).map_err(|e| match e {
			ValidationError::InvalidChar(ch) => Error::wf(WFError::InvalidChar(ctx, ch as u32, false), pos),
			_ => Error::wf(WFError::InvalidSyntax("invalid character data"), pos),
		});
		self.scratchpad.clear();
		result
	}

	fn finish_name(&mut self, ctx: &'static str) -> Result<Name> {
		let pos = self.pos;
		let result = Name::try_from(self.scratchpad_str()?).map_err(|e| match e {
			ValidationError::InvalidChar(ch) => Error::wf(WFError::UnexpectedChar(ctx, ch, None), pos),
			_ => Error::wf(WFError::InvalidSyntax("Name must have at least one Char"), pos),
		});
		self.scratchpad.clear();
		result
	}

	fn lex_name<R: BufRead + ?Sized>(&mut self, r: &mut R, ctx: &'static str) -> Result<Name> {
		match self.peek_byte(r)? {
			Some(b) if CLASS_XML_NAMESTART_BYTE.select(b) => (),
			Some(b) => return Err(self.wf(WFError::UnexpectedByte(ctx, b, Some(&[Token::NAME_NAME])))),
			None => return Err(self.eof(ctx)),
		}
		if self.scan(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length, true)? == Endbyte::Limit {
			return Err(self.restricted("long name"))
		}
		self.finish_name(ctx)
	}

	/// Expand a reference; the `&` has been consumed already.
	fn lex_reference<R: BufRead + ?Sized>(&mut self, r: &mut R, ctx: &'static str) -> Result<()> {
		let first = self.require_byte(r, ERRCTX_REF)?;
		if first != b'#' {
			let mut name = [0u8; 4];
			let mut len = 0;
			let mut b = first;
			while b != b';' {
				if !CLASS_XML_NAME_BYTE.select(b) {
					return Err(self.wf(WFError::UnexpectedByte(ERRCTX_REF, b, Some(&["';'"]))))
				}
				if len == name.len() {
					return Err(self.wf(WFError::UndeclaredEntity))
				}
				name[len] = b;
				len += 1;
				b = self.require_byte(r, ERRCTX_REF)?;
			}
			return match resolve_named_entity(&name[..len]) {
				Some(b) => {
					self.scratchpad.push(b);
					Ok(())
				},
				None => Err(self.wf(WFError::UndeclaredEntity)),
			}
		}

		let mut b = self.require_byte(r, ERRCTX_REF)?;
		let radix = if b == b'x' {
			b = self.require_byte(r, ERRCTX_REF)?;
			16
		} else {
			10
		};
		let mut codepoint: u32 = 0;
		let mut ndigits = 0;
		while b != b';' {
			let digit = match (b as char).to_digit(radix) {
				Some(d) => d,
				None => return Err(self.wf(WFError::UnexpectedByte(ERRCTX_REF, b, Some(&["digit", "';'"])))),
			};
			codepoint = match codepoint.checked_mul(radix).and_then(|v| v.checked_add(digit)) {
				Some(v) => v,
				None => return Err(self.wf(WFError::InvalidChar(ctx, u32::MAX, true))),
			};
			ndigits += 1;
			b = self.require_byte(r, ERRCTX_REF)?;
		}
		if ndigits == 0 {
			return Err(self.wf(WFError::InvalidSyntax("empty character reference")))
		}
		match std::char::from_u32(codepoint) {
			Some(ch) if CLASS_XML_CHAR.select(ch) => {
				let mut buf = [0u8; 4];
				self.scratchpad.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
				Ok(())
			},
			_ => Err(self.wf(WFError::InvalidChar(ctx, codepoint, true))),
		}
	}

	fn lex_content<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Option<Token>> {
		match self.peek_byte(r)? {
			None => {
				self.state = State::Eof;
				Ok(None)
			},
			Some(b'<') => {
				self.next_byte(r)?;
				Ok(Some(self.lex_markup(r)?))
			},
			Some(_) => Ok(Some(self.lex_text(r)?)),
		}
	}

	fn lex_text<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Token> {
		let limit = self.opts.max_token_length;
		loop {
			match self.scan(r, &CLASS_XML_TEXT_DELIMITED_BYTE, limit, true)? {
				Endbyte::Eof | Endbyte::Delimiter(b'<') => break,
				Endbyte::Limit => {
					self.complete_utf8_tail(r)?;
					break
				},
				Endbyte::Delimiter(b'&') => {
					self.next_byte(r)?;
					self.lex_reference(r, ERRCTX_TEXT)?;
				},
				Endbyte::Delimiter(b'\r') => {
					self.next_byte(r)?;
					self.fold_cr(r)?;
					self.scratchpad.push(b'\n');
				},
				Endbyte::Delimiter(b']') => {
					self.next_byte(r)?;
					self.scratchpad.push(b']');
					if self.scratchpad.ends_with(b"]]") && self.peek_byte(r)? == Some(b'>') {
						return Err(self.wf(WFError::InvalidSyntax("']]>' is not allowed in text")))
					}
				},
				Endbyte::Delimiter(b) => return Err(self.wf(WFError::InvalidChar(ERRCTX_TEXT, b as u32, false))),
			}
			if self.scratchpad.len() >= limit {
				break
			}
		}
		let text = self.finish_cdata(ERRCTX_TEXT)?;
		Ok(Token::Text(self.metrics(), text))
	}

	/// Lex markup; the `<` has been consumed already.
	fn lex_markup<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Token> {
		let b = match self.peek_byte(r)? {
			Some(b) => b,
			None => return Err(self.eof(ERRCTX_ELEMENT)),
		};
		match b {
			b'?' => {
				self.next_byte(r)?;
				self.lex_pi_or_decl(r)
			},
			b'!' => {
				self.next_byte(r)?;
				match self.require_byte(r, ERRCTX_UNKNOWN)? {
					b'-' => {
						self.expect_literal(r, b"-", ERRCTX_COMMENT, &["'<!--'"])?;
						self.lex_comment(r)
					},
					b'[' => {
						self.expect_literal(r, b"CDATA[", ERRCTX_CDATA_SECTION, &["'<![CDATA['"])?;
						self.state = State::CDataSection;
						self.lex_cdata_section(r)
					},
					b'D' => {
						self.expect_literal(r, b"OCTYPE", ERRCTX_DOCTYPE, &["'<!DOCTYPE'"])?;
						self.lex_doctype(r)
					},
					b => Err(self.wf(WFError::UnexpectedByte(ERRCTX_UNKNOWN, b, Some(&["'<!--'", "'<![CDATA['", "'<!DOCTYPE'"])))),
				}
			},
			b'/' => {
				self.next_byte(r)?;
				let name = self.lex_name(r, ERRCTX_ELEMENT_FOOT)?;
				self.state = State::Element{kind: ElementKind::Footer, need_space: false};
				Ok(Token::ElementFootStart(self.metrics(), name))
			},
			b if CLASS_XML_NAMESTART_BYTE.select(b) => {
				let name = self.lex_name(r, ERRCTX_ELEMENT)?;
				self.state = State::Element{kind: ElementKind::Header, need_space: false};
				Ok(Token::ElementHeadStart(self.metrics(), name))
			},
			b => Err(self.wf(WFError::UnexpectedByte(ERRCTX_ELEMENT, b, Some(&[Token::NAME_NAME, "'/'", "'!'", "'?'"])))),
		}
	}

	fn lex_element<R: BufRead + ?Sized>(&mut self, r: &mut R, kind: ElementKind, need_space: bool) -> Result<Token> {
		let ctx = kind.errctx();
		let skipped = self.skip_space(r)?;
		self.token_start = self.pos.offset;
		let b = match self.peek_byte(r)? {
			Some(b) => b,
			None => return Err(self.eof(ctx)),
		};
		match b {
			b'>' if kind != ElementKind::XMLDecl => {
				self.next_byte(r)?;
				self.state = State::Content;
				Ok(Token::ElementHFEnd(self.metrics()))
			},
			b'/' if kind == ElementKind::Header => {
				self.next_byte(r)?;
				self.expect_literal(r, b">", ctx, &[Token::NAME_ELEMENTHEADCLOSE])?;
				self.state = State::Content;
				Ok(Token::ElementHeadClose(self.metrics()))
			},
			b'?' if kind == ElementKind::XMLDecl => {
				self.next_byte(r)?;
				self.expect_literal(r, b">", ctx, &[Token::NAME_XMLDECLEND])?;
				self.state = State::Content;
				Ok(Token::XMLDeclEnd(self.metrics()))
			},
			b'=' if kind != ElementKind::Footer => {
				self.next_byte(r)?;
				self.state = State::Element{kind, need_space: false};
				Ok(Token::Eq(self.metrics()))
			},
			b'"' | b'\'' if kind != ElementKind::Footer => {
				self.next_byte(r)?;
				let value = self.lex_attribute_value(r, b)?;
				self.state = State::Element{kind, need_space: true};
				Ok(Token::AttributeValue(self.metrics(), value))
			},
			b if kind != ElementKind::Footer && CLASS_XML_NAMESTART_BYTE.select(b) => {
				if need_space && skipped == 0 {
					return Err(self.wf(WFError::UnexpectedByte(ctx, b, Some(&["whitespace"]))))
				}
				let name = self.lex_name(r, ctx)?;
				self.state = State::Element{kind, need_space: false};
				Ok(Token::Name(self.metrics(), name))
			},
			b => Err(self.wf(WFError::UnexpectedByte(ctx, b, None))),
		}
	}

	fn lex_attribute_value<R: BufRead + ?Sized>(&mut self, r: &mut R, quote: u8) -> Result<CData> {
		let limit = self.opts.max_token_length;
		loop {
			let end = if quote == b'"' {
				self.scan(r, &CLASS_XML_ATT_QUOT_DELIMITED_BYTE, limit, true)?
			} else {
				self.scan(r, &CLASS_XML_ATT_APOS_DELIMITED_BYTE, limit, true)?
			};
			match end {
				Endbyte::Eof => return Err(self.eof(ERRCTX_ATTVAL)),
				Endbyte::Limit => return Err(self.restricted("long attribute value")),
				Endbyte::Delimiter(b) if b == quote => {
					self.next_byte(r)?;
					break
				},
				Endbyte::Delimiter(b'&') => {
					self.next_byte(r)?;
					self.lex_reference(r, ERRCTX_ATTVAL)?;
				},
				Endbyte::Delimiter(b'\t') | Endbyte::Delimiter(b'\n') => {
					self.next_byte(r)?;
					self.scratchpad.push(b' ');
				},
				Endbyte::Delimiter(b'\r') => {
					self.next_byte(r)?;
					self.fold_cr(r)?;
					self.scratchpad.push(b' ');
				},
				Endbyte::Delimiter(b'<') => return Err(self.wf(WFError::UnexpectedByte(ERRCTX_ATTVAL, b'<', None))),
				Endbyte::Delimiter(b) => return Err(self.wf(WFError::InvalidChar(ERRCTX_ATTVAL, b as u32, false))),
			}
		}
		self.finish_cdata(ERRCTX_ATTVAL)
	}

	/// Lex a comment; `<!--` has been consumed already.
	fn lex_comment<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Token> {
		loop {
			match self.scan(r, &CLASS_XML_COMMENT_DELIMITED_BYTE, self.opts.max_token_length, true)? {
				Endbyte::Eof => return Err(self.eof(ERRCTX_COMMENT)),
				Endbyte::Limit => return Err(self.restricted("long comment")),
				Endbyte::Delimiter(b'-') => {
					self.next_byte(r)?;
					if self.peek_byte(r)? == Some(b'-') {
						self.next_byte(r)?;
						match self.require_byte(r, ERRCTX_COMMENT)? {
							b'>' => break,
							_ => return Err(self.wf(WFError::InvalidSyntax("'--' is not allowed in comments"))),
						}
					}
					self.scratchpad.push(b'-');
				},
				Endbyte::Delimiter(b'\r') => {
					self.next_byte(r)?;
					self.fold_cr(r)?;
					self.scratchpad.push(b'\n');
				},
				Endbyte::Delimiter(b) => return Err(self.wf(WFError::InvalidChar(ERRCTX_COMMENT, b as u32, false))),
			}
		}
		let text = self.finish_cdata(ERRCTX_COMMENT)?;
		Ok(Token::Comment(self.metrics(), text))
	}

	fn lex_cdata_section<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Token> {
		let limit = self.opts.max_token_length;
		loop {
			match self.scan(r, &CLASS_XML_CDATA_SECTION_DELIMITED_BYTE, limit, true)? {
				Endbyte::Eof => return Err(self.eof(ERRCTX_CDATA_SECTION)),
				Endbyte::Limit => {
					self.complete_utf8_tail(r)?;
					// a trailing `]` may belong to the terminator
					let keep = self.scratchpad.iter().rposition(|b| *b != b']').map(|i| i + 1).unwrap_or(0);
					if keep > 0 {
						self.carry.extend_from_slice(&self.scratchpad[keep..]);
						self.scratchpad.truncate(keep);
					}
					break
				},
				Endbyte::Delimiter(b']') => {
					self.next_byte(r)?;
					self.scratchpad.push(b']');
					if self.scratchpad.ends_with(b"]]") && self.peek_byte(r)? == Some(b'>') {
						self.next_byte(r)?;
						let len = self.scratchpad.len() - 2;
						self.scratchpad.truncate(len);
						self.state = State::Content;
						break
					}
				},
				Endbyte::Delimiter(b'\r') => {
					self.next_byte(r)?;
					self.fold_cr(r)?;
					self.scratchpad.push(b'\n');
				},
				Endbyte::Delimiter(b) => return Err(self.wf(WFError::InvalidChar(ERRCTX_CDATA_SECTION, b as u32, false))),
			}
		}
		let text = self.finish_cdata(ERRCTX_CDATA_SECTION)?;
		Ok(Token::CDataSection(self.metrics(), text))
	}

	/// Lex a PI or the XML declaration; `<?` has been consumed already.
	fn lex_pi_or_decl<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Token> {
		let target = self.lex_name(r, ERRCTX_PI)?;
		if target == "xml" {
			if !self.at_start {
				return Err(self.wf(WFError::InvalidSyntax("XML declaration not at start of document")))
			}
			self.state = State::Element{kind: ElementKind::XMLDecl, need_space: false};
			return Ok(Token::XMLDeclStart(self.metrics()))
		}
		if let Err(e) = validate_pi_target(&target) {
			return Err(match e {
				ValidationError::ReservedPITarget => self.wf(WFError::InvalidSyntax("reserved processing instruction target")),
				_ => self.wf(WFError::InvalidSyntax("invalid processing instruction target")),
			})
		}
		match self.require_byte(r, ERRCTX_PI)? {
			b'?' => {
				self.expect_literal(r, b">", ERRCTX_PI, &[Token::NAME_XMLDECLEND])?;
			},
			b if CLASS_XML_SPACE_BYTE.select(b) => {
				self.skip_space(r)?;
				loop {
					match self.scan(r, &CLASS_XML_PI_DELIMITED_BYTE, self.opts.max_token_length, true)? {
						Endbyte::Eof => return Err(self.eof(ERRCTX_PI)),
						Endbyte::Limit => return Err(self.restricted("long processing instruction")),
						Endbyte::Delimiter(b'?') => {
							self.next_byte(r)?;
							if self.peek_byte(r)? == Some(b'>') {
								self.next_byte(r)?;
								break
							}
							self.scratchpad.push(b'?');
						},
						Endbyte::Delimiter(b'\r') => {
							self.next_byte(r)?;
							self.fold_cr(r)?;
							self.scratchpad.push(b'\n');
						},
						Endbyte::Delimiter(b) => return Err(self.wf(WFError::InvalidChar(ERRCTX_PI, b as u32, false))),
					}
				}
			},
			b => return Err(self.wf(WFError::UnexpectedByte(ERRCTX_PI, b, Some(&["whitespace", Token::NAME_XMLDECLEND])))),
		}
		let data = self.finish_cdata(ERRCTX_PI)?;
		Ok(Token::ProcessingInstruction(self.metrics(), target, data))
	}

	/// Capture a document type declaration verbatim; `<!DOCTYPE` has been
	/// consumed already.
	fn lex_doctype<R: BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Token> {
		let b = self.require_byte(r, ERRCTX_DOCTYPE)?;
		if !CLASS_XML_SPACE_BYTE.select(b) {
			return Err(self.wf(WFError::UnexpectedByte(ERRCTX_DOCTYPE, b, Some(&["whitespace"]))))
		}
		self.skip_space(r)?;
		let mut subset_depth = 0usize;
		let mut quote: Option<u8> = None;
		loop {
			let b = self.require_byte(r, ERRCTX_DOCTYPE)?;
			match quote {
				Some(q) if b == q => quote = None,
				Some(_) => (),
				None => match b {
					b'"' | b'\'' => quote = Some(b),
					b'[' => subset_depth += 1,
					b']' if subset_depth == 0 => return Err(self.wf(WFError::UnexpectedByte(ERRCTX_DOCTYPE, b, None))),
					b']' => subset_depth -= 1,
					b'>' if subset_depth == 0 => break,
					_ => (),
				},
			}
			if b == b'\r' {
				self.fold_cr(r)?;
				self.scratchpad.push(b'\n');
			} else {
				self.scratchpad.push(b);
			}
			if self.scratchpad.len() > self.opts.max_token_length {
				return Err(self.restricted("long document type declaration"))
			}
		}
		while self.scratchpad.last().map(|b| CLASS_XML_SPACE_BYTE.select(*b)).unwrap_or(false) {
			self.scratchpad.pop();
		}
		let text = self.finish_cdata(ERRCTX_DOCTYPE)?;
		Ok(Token::Doctype(self.metrics(), text))
	}
}

impl Default for Lexer {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Lexer {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Lexer")
			.field("state", &self.state)
			.field("pos", &self.pos)
			.field("err", &self.err)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::convert::TryInto;

	fn lex_all(data: &[u8]) -> (Vec<Token>, Result<()>) {
		lex_all_with(Lexer::new(), data)
	}

	fn lex_all_with(mut lexer: Lexer, mut data: &[u8]) -> (Vec<Token>, Result<()>) {
		let mut tokens = Vec::new();
		loop {
			match lexer.lex(&mut data) {
				Ok(Some(tok)) => tokens.push(tok),
				Ok(None) => return (tokens, Ok(())),
				Err(e) => return (tokens, Err(e)),
			}
		}
	}

	/// A reader which hands out one byte per fill_buf call.
	struct Trickle<'a>(&'a [u8]);

	impl io::Read for Trickle<'_> {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			let n = self.0.len().min(buf.len()).min(1);
			buf[..n].copy_from_slice(&self.0[..n]);
			self.0 = &self.0[n..];
			Ok(n)
		}
	}

	impl BufRead for Trickle<'_> {
		fn fill_buf(&mut self) -> io::Result<&[u8]> {
			Ok(&self.0[..self.0.len().min(1)])
		}

		fn consume(&mut self, amt: usize) {
			self.0 = &self.0[amt..];
		}
	}

	#[test]
	fn lexer_lex_xml_decl() {
		let (toks, result) = lex_all(b"<?xml version=\"1.0\" encoding='utf-8'?>");
		result.unwrap();
		assert_eq!(toks[0], Token::XMLDeclStart(TokenMetrics::new(0, 5)));
		assert_eq!(toks[1], Token::Name(TokenMetrics::new(6, 13), "version".try_into().unwrap()));
		assert_eq!(toks[2], Token::Eq(TokenMetrics::new(13, 14)));
		assert_eq!(toks[3], Token::AttributeValue(TokenMetrics::new(14, 19), "1.0".try_into().unwrap()));
		assert_eq!(toks[4], Token::Name(TokenMetrics::new(20, 28), "encoding".try_into().unwrap()));
		assert_eq!(toks[6], Token::AttributeValue(TokenMetrics::new(29, 36), "utf-8".try_into().unwrap()));
		assert_eq!(toks[7], Token::XMLDeclEnd(TokenMetrics::new(36, 38)));
		assert_eq!(toks.len(), 8);
	}

	#[test]
	fn lexer_rejects_xml_decl_later_in_document() {
		let (toks, result) = lex_all(b"<a/><?xml version='1.0'?>");
		assert_eq!(toks.len(), 2);
		match result {
			Err(Error::NotWellFormed(WFError::InvalidSyntax(_), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_lex_element_with_attributes() {
		let (toks, result) = lex_all(b"<foo a='1' b=\"x&amp;y\">text</foo>");
		result.unwrap();
		assert_eq!(toks[0], Token::ElementHeadStart(TokenMetrics::new(0, 4), "foo".try_into().unwrap()));
		assert_eq!(toks[1], Token::Name(TokenMetrics::new(5, 6), "a".try_into().unwrap()));
		match &toks[6] {
			Token::AttributeValue(_, v) => assert_eq!(v, "x&y"),
			other => panic!("unexpected token: {:?}", other),
		}
		assert_eq!(toks[7], Token::ElementHFEnd(TokenMetrics::new(22, 23)));
		match &toks[8] {
			Token::Text(_, t) => assert_eq!(t, "text"),
			other => panic!("unexpected token: {:?}", other),
		}
		assert_eq!(toks[9], Token::ElementFootStart(TokenMetrics::new(27, 32), "foo".try_into().unwrap()));
		assert_eq!(toks[10], Token::ElementHFEnd(TokenMetrics::new(32, 33)));
	}

	#[test]
	fn lexer_requires_space_between_attributes() {
		let (_, result) = lex_all(b"<foo a='1'b='2'/>");
		match result {
			Err(Error::NotWellFormed(WFError::UnexpectedByte(ERRCTX_ELEMENT, b'b', _), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_lex_empty_element() {
		let (toks, result) = lex_all(b"<foo/>");
		result.unwrap();
		assert_eq!(toks[1], Token::ElementHeadClose(TokenMetrics::new(4, 6)));
	}

	#[test]
	fn lexer_expands_references_in_text() {
		let (toks, result) = lex_all(b"&lt;&#65;&#x42;&gt;&quot;&apos;");
		result.unwrap();
		match &toks[0] {
			Token::Text(_, t) => assert_eq!(t, "<AB>\"'"),
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_undeclared_entity() {
		let (_, result) = lex_all(b"&foo;");
		match result {
			Err(Error::NotWellFormed(WFError::UndeclaredEntity, _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_invalid_char_reference() {
		let (_, result) = lex_all(b"&#0;");
		match result {
			Err(Error::NotWellFormed(WFError::InvalidChar(ERRCTX_TEXT, 0, true), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_folds_line_endings() {
		let (toks, result) = lex_all(b"a\r\nb\rc\n");
		result.unwrap();
		match &toks[0] {
			Token::Text(_, t) => assert_eq!(t, "a\nb\nc\n"),
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_normalizes_attribute_whitespace() {
		let (toks, result) = lex_all(b"<a x='1\t2\r\n3&#10;4'/>");
		result.unwrap();
		match &toks[3] {
			Token::AttributeValue(_, v) => assert_eq!(v, "1 2 3\n4"),
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_lt_in_attribute() {
		let (_, result) = lex_all(b"<a x='<'/>");
		match result {
			Err(Error::NotWellFormed(WFError::UnexpectedByte(ERRCTX_ATTVAL, b'<', _), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_cdata_end_in_text() {
		let (_, result) = lex_all(b"foo]]>bar");
		match result {
			Err(Error::NotWellFormed(WFError::InvalidSyntax(_), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		let (toks, result) = lex_all(b"a]]b]>");
		result.unwrap();
		match &toks[0] {
			Token::Text(_, t) => assert_eq!(t, "a]]b]>"),
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_lex_cdata_section() {
		let (toks, result) = lex_all(b"<![CDATA[<x>&amp;]]]>tail");
		result.unwrap();
		match &toks[0] {
			Token::CDataSection(_, t) => assert_eq!(t, "<x>&amp;]"),
			other => panic!("unexpected token: {:?}", other),
		}
		match &toks[1] {
			Token::Text(_, t) => assert_eq!(t, "tail"),
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_splits_long_cdata_sections_outside_terminator() {
		let lexer = Lexer::with_options(LexerOptions::default().max_token_length(4));
		let (toks, result) = lex_all_with(lexer, b"<![CDATA[abc]]]]>");
		result.unwrap();
		let mut joined = String::new();
		for tok in toks.iter() {
			match tok {
				Token::CDataSection(_, t) => joined.push_str(t),
				other => panic!("unexpected token: {:?}", other),
			}
		}
		assert_eq!(joined, "abc]]");
	}

	#[test]
	fn lexer_lex_comment() {
		let (toks, result) = lex_all(b"<!-- a - b --><!---->");
		result.unwrap();
		match &toks[0] {
			Token::Comment(_, t) => assert_eq!(t, " a - b "),
			other => panic!("unexpected token: {:?}", other),
		}
		match &toks[1] {
			Token::Comment(_, t) => assert_eq!(t, ""),
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_double_hyphen_in_comment() {
		let (_, result) = lex_all(b"<!-- a -- b -->");
		match result {
			Err(Error::NotWellFormed(WFError::InvalidSyntax(_), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_lex_processing_instruction() {
		let (toks, result) = lex_all(b"<?xml-stylesheet href='a.xsl' ?><?empty?>");
		result.unwrap();
		match &toks[0] {
			Token::ProcessingInstruction(_, target, data) => {
				assert_eq!(target, "xml-stylesheet");
				assert_eq!(data, "href='a.xsl' ");
			},
			other => panic!("unexpected token: {:?}", other),
		}
		match &toks[1] {
			Token::ProcessingInstruction(_, target, data) => {
				assert_eq!(target, "empty");
				assert_eq!(data, "");
			},
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_reserved_pi_target() {
		let (_, result) = lex_all(b"<a/><?XML foo?>");
		assert!(result.is_err());
	}

	#[test]
	fn lexer_lex_doctype_with_internal_subset() {
		let (toks, result) = lex_all(b"<!DOCTYPE html [ <!ENTITY x \"]>\"> ]>\n<html/>");
		result.unwrap();
		match &toks[0] {
			Token::Doctype(_, t) => assert_eq!(t, "html [ <!ENTITY x \"]>\"> ]"),
			other => panic!("unexpected token: {:?}", other),
		}
		match &toks[2] {
			Token::ElementHeadStart(_, name) => assert_eq!(name, "html"),
			other => panic!("unexpected token: {:?}", other),
		}
	}

	#[test]
	fn lexer_splits_long_text_on_char_boundaries() {
		let lexer = Lexer::with_options(LexerOptions::default().max_token_length(3));
		let (toks, result) = lex_all_with(lexer, "aaäöü".as_bytes());
		result.unwrap();
		let mut joined = String::new();
		for tok in toks.iter() {
			match tok {
				Token::Text(_, t) => {
					assert!(t.len() <= 4);
					joined.push_str(t);
				},
				other => panic!("unexpected token: {:?}", other),
			}
		}
		assert_eq!(joined, "aaäöü");
		assert!(toks.len() > 1);
	}

	#[test]
	fn lexer_rejects_long_names() {
		let lexer = Lexer::with_options(LexerOptions::default().max_token_length(4));
		let (_, result) = lex_all_with(lexer, b"<abcdefgh/>");
		match result {
			Err(Error::RestrictedXml(..)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_skips_utf8_bom() {
		let (toks, result) = lex_all(b"\xef\xbb\xbf<?xml version='1.0'?><a/>");
		result.unwrap();
		assert_eq!(toks[0], Token::XMLDeclStart(TokenMetrics::new(3, 8)));
	}

	#[test]
	fn lexer_handles_one_byte_reads() {
		let doc = b"<?xml version='1.0'?><a x='&amp;1'>t&#x20;<![CDATA[c]]><!--c--></a>";
		let mut lexer = Lexer::new();
		let mut src = Trickle(&doc[..]);
		let mut fast = Vec::new();
		while let Some(tok) = lexer.lex(&mut src).unwrap() {
			fast.push(tok);
		}
		let (reference, result) = lex_all(doc);
		result.unwrap();
		assert_eq!(fast, reference);
	}

	#[test]
	fn lexer_reports_eof_inside_markup() {
		let (_, result) = lex_all(b"<a x='1");
		match result {
			Err(Error::NotWellFormed(WFError::InvalidEof(ERRCTX_ATTVAL), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_errors_carry_position() {
		let (_, result) = lex_all(b"<a>\n  &bogus;</a>");
		let err = result.err().unwrap();
		let pos = err.location().unwrap();
		assert_eq!(pos.line, 2);
	}

	#[test]
	fn lexer_stays_poisoned() {
		let mut lexer = Lexer::new();
		let mut src = &b"<a \x01"[..];
		lexer.lex(&mut src).unwrap();
		let e1 = lexer.lex(&mut src).err().unwrap();
		let e2 = lexer.lex(&mut &b"<b/>"[..]).err().unwrap();
		assert_eq!(e1, e2);
		assert!(lexer.is_done());
	}

	#[test]
	fn lexer_rejects_invalid_utf8() {
		let (_, result) = lex_all(b"<a>\xff</a>");
		match result {
			Err(Error::Encoding(EncodingError::Malformed("UTF-8"))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}
}
