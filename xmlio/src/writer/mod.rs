/*!
# Namespace-aware XML 1.0 writer

The [`Writer`] turns [`XmlWrite`] calls into well-formed XML text in any
[`bytes::BufMut`].

Start tags stay open until the next call which is not an attribute or
namespace declaration. Only then are the prefixes of the element and its
attributes resolved and the tag written, which allows declarations to be
added after the name and lets an element without content be written as
`<name/>`.

## Namespace repair

With [`WriterOptions::repair_namespaces`] enabled, a namespace without a
prefix in scope is declared on the start tag which needs it: elements take
the default namespace slot if this tag does not declare it already, and all
other cases get a synthesized `tnsN` prefix. Without repair, an undeclared
namespace fails with [`StructureError::UndeclaredNamespace`].

## Example

```
use xmlio::{Writer, XmlWrite};

let mut w = Writer::new(Vec::new());
w.smart_start_tag("", "urn:example", "greeting").unwrap();
w.attribute("", "lang", "en").unwrap();
w.text("Hello & welcome").unwrap();
w.end_document().unwrap();
assert_eq!(
	w.into_inner(),
	b"<greeting xmlns=\"urn:example\" lang=\"en\">Hello &amp; welcome</greeting>".to_vec(),
);
```
*/
use std::convert::TryFrom;
use std::fmt;

use bytes::BufMut;

use crate::encoding::encode_str;
use crate::error::*;
use crate::namespaces::{
	NamespaceBinding, NamespaceContext, NamespaceStack, RcPtr, PREFIX_XML, PREFIX_XMLNS, XMLNS_XML,
	XMLNS_XMLNS,
};
use crate::parser::Event;
use crate::reader::XmlReader;
use crate::strings::{CData, NCName, Name};

const ATTR_SPECIALS: &'static [u8] = &[b'"', b'\r', b'\n', b'\t', b'<', b'&'];

fn escape(out: &mut String, data: &str, specials: &'static [u8]) {
	let bytes = data.as_bytes();
	let mut last_index = 0;
	for i in 0..bytes.len() {
		let ch = bytes[i];
		if !specials.contains(&ch) {
			continue;
		}
		let rep = match ch {
			b'"' => "&#34;",
			b'<' => "&lt;",
			b'&' => "&amp;",
			b'\r' => "&#xd;",
			b'\n' => "&#xa;",
			b'\t' => "&#x9;",
			_ => continue,
		};
		out.push_str(&data[last_index..i]);
		out.push_str(rep);
		last_index = i + 1;
	}
	out.push_str(&data[last_index..]);
}

/// Escape character data.
///
/// `>` is only escaped where it would complete a `]]>`; `brackets` carries
/// the number of trailing `]` over from the previous chunk of text.
fn escape_text(out: &mut String, data: &str, brackets: &mut u8) {
	let bytes = data.as_bytes();
	let mut last_index = 0;
	for i in 0..bytes.len() {
		let rep = match bytes[i] {
			b'<' => "&lt;",
			b'&' => "&amp;",
			b'\r' => "&#xd;",
			b'>' if *brackets >= 2 => "&gt;",
			b']' => {
				*brackets = (*brackets + 1).min(2);
				continue;
			},
			_ => {
				*brackets = 0;
				continue;
			},
		};
		*brackets = 0;
		out.push_str(&data[last_index..i]);
		out.push_str(rep);
		last_index = i + 1;
	}
	out.push_str(&data[last_index..]);
}

fn write_nsdecl(out: &mut String, binding: &NamespaceBinding) {
	match binding.prefix.as_ref() {
		Some(prefix) => {
			out.push_str(" xmlns:");
			out.push_str(prefix);
			out.push_str("=\"");
		},
		None => out.push_str(" xmlns=\""),
	}
	escape(out, binding.uri_str(), ATTR_SPECIALS);
	out.push('"');
}

fn expanded(namespace: &str, local_name: &str) -> String {
	if namespace.is_empty() {
		local_name.to_string()
	} else {
		format!("{{{}}}{}", namespace, local_name)
	}
}

fn is_utf8(name: &str) -> bool {
	name.eq_ignore_ascii_case("UTF-8") || name.eq_ignore_ascii_case("UTF8")
}

/// When to write the XML declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlDeclMode {
	/// Never.
	None,
	/// Only if the document is not plain UTF-8 or `standalone` is given.
	Minimal,
	/// Always, naming the encoding.
	Charset,
	/// Always; the encoding is named if it was passed to
	/// [`XmlWrite::start_document`] or the output is not UTF-8.
	Auto,
}

impl Default for XmlDeclMode {
	fn default() -> Self {
		Self::None
	}
}

/// Hold options to configure a [`Writer`].
#[derive(Debug, Clone)]
pub struct WriterOptions {
	/// Declare namespaces which are not in scope instead of failing.
	///
	/// Defaults to false.
	pub repair_namespaces: bool,
	pub xml_declaration: XmlDeclMode,
	/// Output encoding.
	///
	/// Defaults to UTF-8. Any other name is handed to
	/// [`crate::encoding::encode_str`].
	pub encoding: String,
}

impl WriterOptions {
	pub fn repair_namespaces(mut self, v: bool) -> Self {
		self.repair_namespaces = v;
		self
	}

	pub fn xml_declaration(mut self, mode: XmlDeclMode) -> Self {
		self.xml_declaration = mode;
		self
	}

	pub fn encoding<S: Into<String>>(mut self, name: S) -> Self {
		self.encoding = name.into();
		self
	}
}

impl Default for WriterOptions {
	fn default() -> Self {
		Self{
			repair_namespaces: false,
			xml_declaration: XmlDeclMode::None,
			encoding: "UTF-8".to_string(),
		}
	}
}

/// Sink for structural XML calls.
///
/// Namespace names and prefixes are passed as `&str`; the empty string
/// selects the null namespace and the default prefix respectively.
pub trait XmlWrite {
	/// Begin the document, writing the XML declaration as configured.
	///
	/// Calling this is optional; the first other call starts the document
	/// implicitly.
	fn start_document(&mut self, encoding: Option<&str>, standalone: Option<bool>) -> Result<()>;

	/// Close all open elements and end the document.
	fn end_document(&mut self) -> Result<()>;

	/// Open an element, choosing a prefix for the namespace when the start
	/// tag is written.
	fn start_tag(&mut self, namespace: &str, local_name: &str) -> Result<()>;

	/// Open an element using the given prefix.
	fn start_tag_prefixed(&mut self, prefix: &str, namespace: &str, local_name: &str) -> Result<()>;

	/// Declare a namespace on the open start tag.
	fn namespace(&mut self, prefix: &str, uri: &str) -> Result<()>;

	/// Add an attribute to the open start tag.
	fn attribute(&mut self, namespace: &str, local_name: &str, value: &str) -> Result<()>;

	/// Add an attribute with a preferred prefix to the open start tag.
	fn attribute_prefixed(&mut self, prefix: &str, namespace: &str, local_name: &str, value: &str) -> Result<()>;

	/// Close the innermost element, which must have the given name.
	fn end_tag(&mut self, namespace: &str, local_name: &str) -> Result<()>;

	fn text(&mut self, text: &str) -> Result<()>;

	fn cdata(&mut self, text: &str) -> Result<()>;

	fn comment(&mut self, text: &str) -> Result<()>;

	fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()>;

	/// Write a document type declaration; `text` is everything between
	/// `<!DOCTYPE ` and the final `>`.
	fn doctype(&mut self, text: &str) -> Result<()>;

	/// Number of open elements, including an unwritten start tag.
	fn depth(&self) -> usize;

	/// The bindings in scope at the current position.
	fn namespace_context(&self) -> &dyn NamespaceContext;

	/// Open an element and declare `prefix` for `namespace` unless exactly
	/// this binding is already visible.
	fn smart_start_tag(&mut self, prefix: &str, namespace: &str, local_name: &str) -> Result<()> {
		let visible = self.namespace_context().resolve_uri(prefix).unwrap_or("") == namespace;
		self.start_tag_prefixed(prefix, namespace, local_name)?;
		if !visible {
			self.namespace(prefix, namespace)?;
		}
		Ok(())
	}

	/// Write an event produced by an [`XmlReader`].
	///
	/// Prefixes and namespace declarations of elements are kept.
	fn write_event(&mut self, ev: &Event) -> Result<()> {
		match ev {
			Event::StartDocument(_, decl) => match decl {
				Some(decl) => self.start_document(decl.encoding.as_ref().map(|e| e.as_str()), decl.standalone),
				None => self.start_document(None, None),
			},
			Event::EndDocument(_) => self.end_document(),
			Event::StartElement(_, name, attributes, declarations) => {
				let prefix = name.prefix.as_ref().map(|p| p.as_str()).unwrap_or("");
				self.start_tag_prefixed(prefix, name.namespace_str(), &name.local_name)?;
				for decl in declarations.iter() {
					self.namespace(decl.prefix_str(), decl.uri_str())?;
				}
				for attr in attributes.iter() {
					let prefix = attr.name.prefix.as_ref().map(|p| p.as_str()).unwrap_or("");
					self.attribute_prefixed(prefix, attr.name.namespace_str(), &attr.name.local_name, &attr.value)?;
				}
				Ok(())
			},
			Event::EndElement(_, name) => self.end_tag(name.namespace_str(), &name.local_name),
			Event::Text(_, text) | Event::IgnorableWhitespace(_, text) => self.text(text),
			Event::CData(_, text) => self.cdata(text),
			Event::Comment(_, text) => self.comment(text),
			Event::ProcessingInstruction(_, target, data) => self.processing_instruction(target, data),
			Event::DoctypeDecl(_, text) => self.doctype(text),
		}
	}
}

/// Pipe all events of `reader` into `writer`, up to and including the end
/// of the document.
pub fn copy_events<R: XmlReader + ?Sized, W: XmlWrite + ?Sized>(reader: &mut R, writer: &mut W) -> Result<()> {
	loop {
		let ev = reader.next()?;
		writer.write_event(&ev)?;
		if let Event::EndDocument(..) = ev {
			return Ok(())
		}
	}
}

struct HeadAttribute {
	namespace: CData,
	prefix: Option<NCName>,
	local_name: NCName,
	value: CData,
}

/// A start tag which has not been written yet.
struct Head {
	namespace: CData,
	/// `Some` if the caller asked for a prefix; `Some(None)` is the default
	/// namespace.
	prefix: Option<Option<NCName>>,
	local_name: NCName,
	attributes: Vec<HeadAttribute>,
}

struct OpenTag {
	namespace: CData,
	local_name: NCName,
	name: Name,
}

/**
# Writer for XML 1.0 with namespaces

Writers are stateful and write a single document; a writer which returned
an error keeps returning it.

No check is made that there is exactly one document element, so a writer
can also produce a sequence of sibling nodes.
*/
pub struct Writer<O> {
	out: O,
	opts: WriterOptions,
	utf8: bool,
	ns: NamespaceStack,
	head: Option<Head>,
	open: Vec<OpenTag>,
	started: bool,
	ended: bool,
	seen_element: bool,
	brackets: u8,
	next_prefix: usize,
	err: Option<Error>,
}

impl<O: BufMut> Writer<O> {
	/// Create a writer with default options.
	pub fn new(out: O) -> Self {
		Self::with_options(out, WriterOptions::default())
	}

	pub fn with_options(out: O, opts: WriterOptions) -> Self {
		Self{
			out,
			utf8: is_utf8(&opts.encoding),
			opts,
			ns: NamespaceStack::new(),
			head: None,
			open: Vec::new(),
			started: false,
			ended: false,
			seen_element: false,
			brackets: 0,
			next_prefix: 0,
			err: None,
		}
	}

	pub fn get_ref(&self) -> &O {
		&self.out
	}

	pub fn get_mut(&mut self) -> &mut O {
		&mut self.out
	}

	/// Return the sink.
	///
	/// Open elements are not closed; call [`XmlWrite::end_document`] first
	/// for a complete document.
	pub fn into_inner(self) -> O {
		self.out
	}

	pub fn options(&self) -> &WriterOptions {
		&self.opts
	}

	/// Treat `bindings` as declared by an enclosing context which is not
	/// part of the output.
	///
	/// Only allowed before the first start tag.
	pub fn assume_bindings<I: IntoIterator<Item = NamespaceBinding>>(&mut self, bindings: I) -> Result<()> {
		self.guard(|w| {
			if w.ns.depth() > 0 || w.seen_element {
				return Err(Error::state("bindings can only be assumed before the first element"))
			}
			for binding in bindings {
				w.ns.push_binding(binding);
			}
			Ok(())
		})
	}

	fn guard<T, F: FnOnce(&mut Self) -> Result<T>>(&mut self, f: F) -> Result<T> {
		if let Some(e) = self.err.as_ref() {
			return Err(e.clone())
		}
		let result = f(self);
		if let Err(e) = result.as_ref() {
			log::debug!("writer failed: {}", e);
			self.err = Some(e.clone());
		}
		result
	}

	fn put(&mut self, s: &str) -> Result<()> {
		if self.utf8 {
			self.out.put_slice(s.as_bytes());
		} else {
			let encoded = encode_str(s, &self.opts.encoding)?;
			self.out.put_slice(&encoded);
		}
		Ok(())
	}

	fn begin(&mut self, encoding: Option<&str>, standalone: Option<bool>) -> Result<()> {
		self.started = true;
		let declared = encoding.unwrap_or(&self.opts.encoding);
		let (emit, with_encoding) = match self.opts.xml_declaration {
			XmlDeclMode::None => (false, false),
			XmlDeclMode::Minimal => {
				let plain = is_utf8(declared);
				(!plain || standalone.is_some(), !plain)
			},
			XmlDeclMode::Charset => (true, true),
			XmlDeclMode::Auto => (true, encoding.is_some() || !self.utf8),
		};
		if !emit {
			return Ok(())
		}
		let mut decl = String::from("<?xml version=\"1.0\"");
		if with_encoding {
			decl.push_str(" encoding=\"");
			decl.push_str(declared);
			decl.push('"');
		}
		match standalone {
			Some(true) => decl.push_str(" standalone=\"yes\""),
			Some(false) => decl.push_str(" standalone=\"no\""),
			None => (),
		}
		decl.push_str("?>");
		self.put(&decl)
	}

	/// Get ready to write anything but attributes.
	fn prepare(&mut self) -> Result<()> {
		if self.ended {
			return Err(Error::state("document already ended"))
		}
		if !self.started {
			self.begin(None, None)?;
		}
		self.close_head(false)?;
		self.brackets = 0;
		Ok(())
	}

	fn undeclared(uri: &str) -> Error {
		StructureError::UndeclaredNamespace(uri.to_string()).into()
	}

	fn synthesize_prefix(&mut self) -> NCName {
		loop {
			let candidate = format!("tns{}", self.next_prefix);
			self.next_prefix += 1;
			if !self.ns.is_bound(&candidate) {
				return NCName::from_validated(candidate)
			}
		}
	}

	fn declare(&mut self, prefix: Option<NCName>, uri: &str) {
		log::trace!("declaring {:?} for namespace {:?}", prefix.as_ref().map(|p| p.as_str()).unwrap_or(""), uri);
		self.ns.push_binding(NamespaceBinding::new(prefix, RcPtr::new(CData::from_validated(uri))));
	}

	fn element_prefix(&mut self, uri: &str, requested: Option<&Option<NCName>>) -> Result<Option<NCName>> {
		let repair = self.opts.repair_namespaces;
		if let Some(requested) = requested {
			let prefix = requested.as_ref().map(|p| p.as_str()).unwrap_or("");
			if self.ns.resolve_uri(prefix).unwrap_or("") == uri {
				return Ok(requested.clone())
			}
			if !repair {
				return Err(Self::undeclared(uri))
			}
			if !self.ns.is_declared_here(prefix) && (prefix.is_empty() || !uri.is_empty()) && prefix != PREFIX_XML {
				self.declare(requested.clone(), uri);
				return Ok(requested.clone())
			}
		}
		if uri.is_empty() {
			if self.ns.resolve_uri("").is_none() {
				return Ok(None)
			}
			if repair && !self.ns.is_declared_here("") {
				self.declare(None, "");
				return Ok(None)
			}
			return Err(Self::undeclared(uri))
		}
		if let Some(prefix) = self.ns.resolve_prefix(uri) {
			if prefix.is_empty() {
				return Ok(None)
			}
			return Ok(Some(NCName::from_validated(prefix)))
		}
		if !repair {
			return Err(Self::undeclared(uri))
		}
		if !self.ns.is_declared_here("") {
			self.declare(None, uri);
			return Ok(None)
		}
		let prefix = self.synthesize_prefix();
		self.declare(Some(prefix.clone()), uri);
		Ok(Some(prefix))
	}

	fn attribute_prefix(&mut self, uri: &str, requested: Option<&NCName>) -> Result<Option<NCName>> {
		if uri.is_empty() {
			return Ok(None)
		}
		if let Some(prefix) = requested {
			if self.ns.resolve_uri(prefix) == Some(uri) {
				return Ok(Some(prefix.clone()))
			}
		}
		// attributes cannot use the default namespace
		let existing = self.ns.prefixes_for(uri).into_iter().find(|p| !p.is_empty()).map(NCName::from_validated);
		if let Some(prefix) = existing {
			return Ok(Some(prefix))
		}
		if !self.opts.repair_namespaces {
			return Err(Self::undeclared(uri))
		}
		let prefix = match requested {
			Some(prefix) if self.ns.resolve_uri(prefix).is_none() && !self.ns.is_declared_here(prefix) => prefix.clone(),
			_ => self.synthesize_prefix(),
		};
		self.declare(Some(prefix.clone()), uri);
		Ok(Some(prefix))
	}

	/// Resolve all prefixes of the pending start tag and write it.
	fn close_head(&mut self, empty: bool) -> Result<()> {
		let head = match self.head.take() {
			Some(head) => head,
			None => return Ok(()),
		};
		let prefix = self.element_prefix(&head.namespace, head.prefix.as_ref())?;
		let mut attr_prefixes = Vec::with_capacity(head.attributes.len());
		for attr in head.attributes.iter() {
			attr_prefixes.push(self.attribute_prefix(&attr.namespace, attr.prefix.as_ref())?);
		}
		let name = head.local_name.with_prefix(prefix.as_ref());

		let mut tag = String::with_capacity(64);
		tag.push('<');
		tag.push_str(&name);
		for binding in self.ns.current_declarations() {
			write_nsdecl(&mut tag, binding);
		}
		for (attr, prefix) in head.attributes.iter().zip(attr_prefixes.iter()) {
			tag.push(' ');
			if let Some(prefix) = prefix {
				tag.push_str(prefix);
				tag.push(':');
			}
			tag.push_str(&attr.local_name);
			tag.push_str("=\"");
			escape(&mut tag, &attr.value, ATTR_SPECIALS);
			tag.push('"');
		}
		tag.push_str(if empty { "/>" } else { ">" });
		self.put(&tag)?;

		if empty {
			self.ns.dec_depth();
		} else {
			self.open.push(OpenTag{
				namespace: head.namespace,
				local_name: head.local_name,
				name,
			});
		}
		Ok(())
	}

	fn open_tag(&mut self, prefix: Option<&str>, namespace: &str, local_name: &str) -> Result<()> {
		let local_name = NCName::try_from(local_name).map_err(|e| Error::invalid("local name", e))?;
		let namespace = CData::try_from(namespace).map_err(|e| Error::invalid("namespace name", e))?;
		let prefix = match prefix {
			None => None,
			Some("") => Some(None),
			Some(PREFIX_XMLNS) => return Err(StructureError::ReservedNamespace(PREFIX_XMLNS.to_string()).into()),
			Some(p) => Some(Some(NCName::try_from(p).map_err(|e| Error::invalid("prefix", e))?)),
		};
		self.prepare()?;
		self.seen_element = true;
		self.ns.inc_depth();
		self.head = Some(Head{
			namespace,
			prefix,
			local_name,
			attributes: Vec::new(),
		});
		Ok(())
	}

	fn add_attribute(&mut self, prefix: Option<&str>, namespace: &str, local_name: &str, value: &str) -> Result<()> {
		let local_name = NCName::try_from(local_name).map_err(|e| Error::invalid("local name", e))?;
		let namespace = CData::try_from(namespace).map_err(|e| Error::invalid("namespace name", e))?;
		let value = CData::try_from(value).map_err(|e| Error::invalid("attribute value", e))?;
		let prefix = match prefix {
			None | Some("") => None,
			Some(PREFIX_XMLNS) => return Err(StructureError::ReservedNamespace(PREFIX_XMLNS.to_string()).into()),
			Some(p) => Some(NCName::try_from(p).map_err(|e| Error::invalid("prefix", e))?),
		};
		let head = match self.head.as_mut() {
			Some(head) => head,
			None => return Err(Error::state("attribute outside of start tag")),
		};
		if head.attributes.iter().any(|a| a.namespace == namespace && a.local_name == local_name) {
			return Err(StructureError::InvalidContent("duplicate attribute").into())
		}
		head.attributes.push(HeadAttribute{namespace, prefix, local_name, value});
		Ok(())
	}

	fn close_tag(&mut self, namespace: &str, local_name: &str) -> Result<()> {
		if self.ended {
			return Err(Error::state("document already ended"))
		}
		let (open_ns, open_local) = match (self.head.as_ref(), self.open.last()) {
			(Some(head), _) => (head.namespace.as_str(), head.local_name.as_str()),
			(None, Some(tag)) => (tag.namespace.as_str(), tag.local_name.as_str()),
			(None, None) => return Err(StructureError::NoOpenElement.into()),
		};
		if open_ns != namespace || open_local != local_name {
			return Err(StructureError::EndTagMismatch{
				expected: expanded(open_ns, open_local),
				actual: expanded(namespace, local_name),
			}.into())
		}
		self.brackets = 0;
		if self.head.is_some() {
			return self.close_head(true)
		}
		let tag = match self.open.pop() {
			Some(tag) => tag,
			None => return Err(StructureError::NoOpenElement.into()),
		};
		self.put(&format!("</{}>", tag.name))?;
		self.ns.dec_depth();
		Ok(())
	}

	fn close_all(&mut self) -> Result<()> {
		if self.ended {
			return Ok(())
		}
		if !self.started {
			self.begin(None, None)?;
		}
		loop {
			let (namespace, local_name) = match (self.head.as_ref(), self.open.last()) {
				(Some(head), _) => (head.namespace.clone(), head.local_name.clone()),
				(None, Some(tag)) => (tag.namespace.clone(), tag.local_name.clone()),
				(None, None) => break,
			};
			self.close_tag(&namespace, &local_name)?;
		}
		self.ended = true;
		Ok(())
	}

	fn declare_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
		if self.head.is_none() {
			return Err(Error::state("namespace declaration outside of start tag"))
		}
		let reserved = |what: &str| -> Error { StructureError::ReservedNamespace(what.to_string()).into() };
		match prefix {
			PREFIX_XMLNS => return Err(reserved(prefix)),
			PREFIX_XML if uri == XMLNS_XML => return Ok(()),
			PREFIX_XML => return Err(reserved(prefix)),
			_ if uri == XMLNS_XML || uri == XMLNS_XMLNS => return Err(reserved(uri)),
			_ => (),
		}
		let uri = CData::try_from(uri).map_err(|e| Error::invalid("namespace name", e))?;
		let prefix = if prefix.is_empty() {
			None
		} else {
			Some(NCName::try_from(prefix).map_err(|e| Error::invalid("prefix", e))?)
		};
		if prefix.is_some() && uri.is_empty() {
			return Err(StructureError::InvalidContent("prefix bound to empty namespace name").into())
		}
		if let Some(existing) = self.ns.current_declarations().iter().find(|b| b.prefix == prefix) {
			if existing.uri_str() == uri.as_str() {
				return Ok(())
			}
			return Err(StructureError::InvalidContent("prefix declared twice on one element").into())
		}
		self.ns.push_binding(NamespaceBinding::new(prefix, RcPtr::new(uri)));
		Ok(())
	}

	fn write_text(&mut self, text: &str) -> Result<()> {
		CData::try_from(text).map_err(|e| Error::invalid("text", e))?;
		let mut brackets = if self.head.is_some() { 0 } else { self.brackets };
		self.prepare()?;
		let mut escaped = String::with_capacity(text.len());
		escape_text(&mut escaped, text, &mut brackets);
		self.put(&escaped)?;
		self.brackets = brackets;
		Ok(())
	}

	fn write_cdata(&mut self, text: &str) -> Result<()> {
		CData::try_from(text).map_err(|e| Error::invalid("CDATA section", e))?;
		self.prepare()?;
		let mut section = String::with_capacity(text.len() + 12);
		section.push_str("<![CDATA[");
		section.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
		section.push_str("]]>");
		self.put(&section)
	}

	fn write_comment(&mut self, text: &str) -> Result<()> {
		CData::try_from(text).map_err(|e| Error::invalid("comment", e))?;
		if text.contains("--") || text.ends_with('-') {
			return Err(StructureError::InvalidContent("comment contains '--' or ends with '-'").into())
		}
		self.prepare()?;
		self.put(&format!("<!--{}-->", text))
	}

	fn write_pi(&mut self, target: &str, data: &str) -> Result<()> {
		Name::try_from(target).map_err(|e| Error::invalid("processing instruction target", e))?;
		CData::try_from(data).map_err(|e| Error::invalid("processing instruction data", e))?;
		if target.eq_ignore_ascii_case("xml") {
			return Err(StructureError::InvalidContent("reserved processing instruction target").into())
		}
		if data.contains("?>") {
			return Err(StructureError::InvalidContent("processing instruction data contains '?>'").into())
		}
		self.prepare()?;
		if data.is_empty() {
			self.put(&format!("<?{}?>", target))
		} else {
			self.put(&format!("<?{} {}?>", target, data))
		}
	}

	fn write_doctype(&mut self, text: &str) -> Result<()> {
		CData::try_from(text).map_err(|e| Error::invalid("document type declaration", e))?;
		if self.seen_element {
			return Err(Error::state("document type declaration after first element"))
		}
		self.prepare()?;
		self.put(&format!("<!DOCTYPE {}>", text))
	}
}

impl<O: BufMut> XmlWrite for Writer<O> {
	fn start_document(&mut self, encoding: Option<&str>, standalone: Option<bool>) -> Result<()> {
		self.guard(|w| {
			if w.started {
				return Err(Error::state("document already started"))
			}
			w.begin(encoding, standalone)
		})
	}

	fn end_document(&mut self) -> Result<()> {
		self.guard(|w| w.close_all())
	}

	fn start_tag(&mut self, namespace: &str, local_name: &str) -> Result<()> {
		self.guard(|w| w.open_tag(None, namespace, local_name))
	}

	fn start_tag_prefixed(&mut self, prefix: &str, namespace: &str, local_name: &str) -> Result<()> {
		self.guard(|w| w.open_tag(Some(prefix), namespace, local_name))
	}

	fn namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
		self.guard(|w| w.declare_namespace(prefix, uri))
	}

	fn attribute(&mut self, namespace: &str, local_name: &str, value: &str) -> Result<()> {
		self.guard(|w| w.add_attribute(None, namespace, local_name, value))
	}

	fn attribute_prefixed(&mut self, prefix: &str, namespace: &str, local_name: &str, value: &str) -> Result<()> {
		self.guard(|w| w.add_attribute(Some(prefix), namespace, local_name, value))
	}

	fn end_tag(&mut self, namespace: &str, local_name: &str) -> Result<()> {
		self.guard(|w| w.close_tag(namespace, local_name))
	}

	fn text(&mut self, text: &str) -> Result<()> {
		self.guard(|w| w.write_text(text))
	}

	fn cdata(&mut self, text: &str) -> Result<()> {
		self.guard(|w| w.write_cdata(text))
	}

	fn comment(&mut self, text: &str) -> Result<()> {
		self.guard(|w| w.write_comment(text))
	}

	fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
		self.guard(|w| w.write_pi(target, data))
	}

	fn doctype(&mut self, text: &str) -> Result<()> {
		self.guard(|w| w.write_doctype(text))
	}

	fn depth(&self) -> usize {
		self.ns.depth()
	}

	fn namespace_context(&self) -> &dyn NamespaceContext {
		&self.ns
	}
}

impl<O> fmt::Debug for Writer<O> {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Writer")
			.field("opts", &self.opts)
			.field("ns", &self.ns)
			.field("started", &self.started)
			.field("ended", &self.ended)
			.field("err", &self.err)
			.finish()
	}
}
