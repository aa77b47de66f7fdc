/*!
# Fragment capture and replay

A [`Fragment`] is a piece of XML taken out of a document together with the
namespace bindings it needs from the document it was taken from. It can be
stored and parsed again later, on its own, with a [`FragmentReader`].

## Capture

[`Fragment::capture`] reads from an [`XmlReader`] starting at its current
event and serializes everything up to the end of the enclosing element.
All namespace bindings in scope around the content are recorded with their
namespace names, whether the content uses them in names or not: prefixes
can also appear in attribute values and text (`xsi:type="t:Int"`). Those
declarations are not repeated in the serialized content.

## Replay

For parsing, the content is placed inside a synthetic wrapper element which
declares the recorded bindings. Wrapper start tag, content and end tag are
fed to an ordinary [`Tokenizer`] through a [`CombiningReader`], so the
content is never copied. The [`FragmentReader`] hides the wrapper: its
events, its depth and its namespace declaration do not show up.

```
use xmlio::{Event, Fragment, Tokenizer, XmlReader};

let mut tok = Tokenizer::from_str("<doc xmlns:p='urn:p'><p:item>one</p:item><p:item>two</p:item></doc>");
tok.next().unwrap();
tok.next().unwrap();
tok.next().unwrap();
let fragment = Fragment::capture(&mut tok).unwrap();
assert_eq!(fragment.content(), &b"<p:item>one</p:item><p:item>two</p:item>"[..]);

let mut r = fragment.reader().unwrap();
match r.next().unwrap() {
	Event::StartElement(m, name, ..) => {
		assert_eq!(m.depth(), 1);
		assert_eq!(name.namespace_str(), "urn:p");
	},
	other => panic!("unexpected event: {:?}", other),
}
```
*/
use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};

mod combine;

pub use combine::CombiningReader;

use crate::delegate::DelegatingReader;
use crate::error::*;
use crate::namespaces::{NamespaceBinding, NamespaceContext, NamespaceSnapshot, NamespaceStack};
use crate::parser::{Event, EventMetrics, QName, ReaderOptions, Tokenizer};
use crate::reader::XmlReader;
use crate::writer::{Writer, XmlWrite};

/// Prefix of the wrapper element; a digit is appended if a recorded binding
/// uses it.
const WRAPPER_PREFIX: &'static str = "xmlio-fragment";
const WRAPPER_NAMESPACE: &'static str = "urn:xmlio:fragment";
const WRAPPER_LOCAL_NAME: &'static str = "wrapper";

/// Record the binding of the prefix of `name` unless the captured content
/// declares it itself or it is already recorded.
///
/// This covers outer bindings shadowed by the first captured element but
/// used by its following siblings.
fn require(inner: &NamespaceStack, required: &mut Vec<NamespaceBinding>, name: &QName) {
	let uri = match name.namespace.as_ref() {
		Some(uri) => uri,
		None => return,
	};
	let prefix = name.prefix.as_ref().map(|p| p.as_str()).unwrap_or("");
	if inner.is_bound(prefix) || required.iter().any(|b| b.prefix_str() == prefix) {
		return
	}
	required.push(NamespaceBinding::new(name.prefix.clone(), uri.clone()));
}

/// Bindings in scope around the captured content, outermost first.
///
/// `ctx` is the context at the first captured event. If that is a start tag,
/// its own declarations are part of the content and are left out.
fn outer_bindings(ctx: &NamespaceSnapshot, first: &Event) -> Vec<NamespaceBinding> {
	let own: &[NamespaceBinding] = match first {
		Event::StartElement(_, _, _, declarations) => &declarations[..],
		_ => &[],
	};
	ctx.bindings()
		.into_iter()
		.filter(|b| !b.uri_str().is_empty())
		.filter(|b| !own.iter().any(|d| d.prefix == b.prefix))
		.collect()
}

fn serialize(bindings: &[NamespaceBinding], events: &[Event]) -> Result<Bytes> {
	let mut writer = Writer::new(BytesMut::new());
	writer.assume_bindings(bindings.iter().cloned())?;
	for ev in events.iter() {
		writer.write_event(ev)?;
	}
	writer.end_document()?;
	Ok(writer.into_inner().freeze())
}

/// Captured XML content with the namespace bindings it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
	content: Bytes,
	namespaces: Vec<NamespaceBinding>,
}

impl Fragment {
	/// Capture the content of the enclosing element, starting at the
	/// current event of `reader`.
	///
	/// If the current event is a start tag, that element is the first part
	/// of the fragment. If it is an end tag, only the following siblings are
	/// captured. Before the first event or on the start of the document, the
	/// whole document content is captured.
	///
	/// Afterwards, the current event of `reader` is the end tag of the
	/// enclosing element (or the end of the document). Document type
	/// declarations are dropped.
	pub fn capture<R: XmlReader + ?Sized>(reader: &mut R) -> Result<Fragment> {
		let (parent, mut pending) = match reader.current() {
			Some(Event::StartElement(m, ..)) => (m.depth() - 1, reader.current().cloned()),
			Some(Event::EndElement(m, ..)) => (m.depth() - 1, None),
			Some(Event::StartDocument(..)) | None => (0, None),
			Some(Event::EndDocument(..)) => return Ok(Self::from_parts(Bytes::new(), Vec::new())),
			Some(other) => (other.depth(), reader.current().cloned()),
		};

		let mut events = Vec::new();
		let mut inner = NamespaceStack::new();
		let mut required: Option<Vec<NamespaceBinding>> = None;
		loop {
			let ev = match pending.take() {
				Some(ev) => ev,
				None => reader.next()?,
			};
			// taken only now, so that the scope of an element which ended
			// right before the capture has been left
			let required = required.get_or_insert_with(|| outer_bindings(&reader.namespace_context(), &ev));
			match &ev {
				Event::EndDocument(..) => break,
				Event::EndElement(m, _) if m.depth() == parent => break,
				Event::StartDocument(..) | Event::DoctypeDecl(..) => continue,
				Event::StartElement(_, name, attributes, declarations) => {
					inner.inc_depth();
					for decl in declarations.iter() {
						inner.push_binding(decl.clone());
					}
					require(&inner, required, name);
					for attr in attributes.iter().filter(|a| a.name.prefix.is_some()) {
						require(&inner, required, &attr.name);
					}
				},
				Event::EndElement(..) => inner.dec_depth(),
				_ => (),
			}
			events.push(ev);
		}

		let required = required.unwrap_or_default();
		let content = match serialize(&required, &events) {
			Ok(content) => content,
			Err(e) => return Err(reader.poison(e)),
		};
		log::debug!("captured fragment of {} bytes requiring {} namespace bindings", content.len(), required.len());
		Ok(Self{content, namespaces: required})
	}

	/// Assemble a fragment from serialized content and the bindings it
	/// needs.
	///
	/// The content is not checked until it is read.
	pub fn from_parts(content: Bytes, namespaces: Vec<NamespaceBinding>) -> Fragment {
		Self{content, namespaces}
	}

	/// The serialized content, UTF-8 encoded.
	pub fn content(&self) -> &[u8] {
		&self.content
	}

	/// Bindings in scope around the content when it was captured.
	pub fn namespaces(&self) -> &[NamespaceBinding] {
		&self.namespaces
	}

	pub fn into_parts(self) -> (Bytes, Vec<NamespaceBinding>) {
		(self.content, self.namespaces)
	}

	/// Parse the fragment with default options.
	pub fn reader(&self) -> Result<FragmentReader> {
		FragmentReader::new(self, ReaderOptions::default())
	}

	/// Parse the fragment.
	///
	/// The encoding settings of the options are not used.
	pub fn reader_with_options(&self, opts: ReaderOptions) -> Result<FragmentReader> {
		FragmentReader::new(self, opts)
	}
}

type Source = CombiningReader<io::Cursor<Bytes>>;

/// Build start and end tag of the wrapper element.
fn wrapper(namespaces: &[NamespaceBinding]) -> Result<(Bytes, Bytes)> {
	let mut prefix = WRAPPER_PREFIX.to_string();
	let mut n = 0;
	while namespaces.iter().any(|b| b.prefix_str() == prefix) {
		n += 1;
		prefix = format!("{}{}", WRAPPER_PREFIX, n);
	}
	let mut w = Writer::new(BytesMut::new());
	w.start_tag_prefixed(&prefix, WRAPPER_NAMESPACE, WRAPPER_LOCAL_NAME)?;
	w.namespace(&prefix, WRAPPER_NAMESPACE)?;
	for binding in namespaces.iter() {
		w.namespace(binding.prefix_str(), binding.uri_str())?;
	}
	// forces the start tag out
	w.text("")?;
	let start = w.into_inner().freeze();
	let end = Bytes::from(format!("</{}:{}>", prefix, WRAPPER_LOCAL_NAME));
	log::trace!("fragment wrapper: {:?}", String::from_utf8_lossy(&start));
	Ok((start, end))
}

/**
# Reader for a [`Fragment`]

Events are those of the content as if it were parsed on its own: the depth
of top-level nodes is 0 for text and 1 for elements, and the namespace
context consists of the recorded bindings plus what the content declares.
The fragment ends with a single [`Event::EndDocument`], which is repeated
on every further call.
*/
pub struct FragmentReader {
	base: DelegatingReader<Tokenizer<Source>>,
	opts: ReaderOptions,
	root: NamespaceSnapshot,
	scope: NamespaceSnapshot,
	pending_pop: bool,
	current: Option<Event>,
	done: bool,
	err: Option<Error>,
	/// Bytes and characters of the wrapper start tag
	skipped: (usize, usize),
}

impl FragmentReader {
	pub fn new(fragment: &Fragment, opts: ReaderOptions) -> Result<Self> {
		let (start, end) = wrapper(&fragment.namespaces)?;
		let skipped = (start.len(), String::from_utf8_lossy(&start).chars().count());
		let src = CombiningReader::new(vec![
			io::Cursor::new(start),
			io::Cursor::new(fragment.content.clone()),
			io::Cursor::new(end),
		]);
		let root = NamespaceSnapshot::root(fragment.namespaces.clone());
		Ok(Self{
			base: DelegatingReader::new(Tokenizer::with_options(src, opts.clone())),
			opts,
			scope: root.clone(),
			root,
			pending_pop: false,
			current: None,
			done: false,
			err: None,
			skipped,
		})
	}

	/// Start reading the fragment from the beginning again.
	pub fn restart(self) -> Result<Self> {
		let mut src = self.base.into_inner().into_inner();
		src.reset().map_err(Error::io)?;
		Ok(Self{
			base: DelegatingReader::new(Tokenizer::with_options(src, self.opts.clone())),
			opts: self.opts,
			scope: self.root.clone(),
			root: self.root,
			pending_pop: false,
			current: None,
			done: false,
			err: None,
			skipped: self.skipped,
		})
	}

	fn read_event(&mut self) -> Result<Event> {
		if self.pending_pop {
			self.pending_pop = false;
			self.scope = self.scope.parent();
		}
		if self.done {
			return Ok(Event::EndDocument(EventMetrics::new(0, 0)))
		}
		loop {
			let ev = self.base.next()?;
			match ev {
				Event::EndDocument(..) => {
					self.done = true;
					return Ok(ev)
				},
				Event::StartDocument(..) => (),
				// the wrapper
				Event::StartElement(m, ..) | Event::EndElement(m, ..) if m.depth() <= 1 => (),
				// nothing but the wrapper is at depth zero
				ref other if other.depth() == 0 => (),
				other => {
					match &other {
						Event::StartElement(_, _, _, declarations) => self.scope = self.scope.push(declarations.clone()),
						Event::EndElement(..) => self.pending_pop = true,
						_ => (),
					}
					let depth = other.depth() - 1;
					return Ok(other.with_depth(depth))
				},
			}
		}
	}
}

impl XmlReader for FragmentReader {
	fn next(&mut self) -> Result<Event> {
		if let Some(err) = self.err.as_ref() {
			return Err(err.clone())
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
		if self.done {
			return 0
		}
		self.base.depth().saturating_sub(1)
	}

	fn namespace_context(&self) -> NamespaceSnapshot {
		self.scope.clone()
	}

	/// Position within the fragment content.
	fn position(&self) -> Position {
		let mut pos = self.base.position();
		pos.offset = pos.offset.saturating_sub(self.skipped.0);
		if pos.line == 1 {
			pos.column = pos.column.saturating_sub(self.skipped.1).max(1);
		}
		pos
	}

	fn poison(&mut self, err: Error) -> Error {
		if self.err.is_none() {
			log::debug!("fragment reader failed: {}", err);
			self.err = Some(err.clone());
		}
		self.base.poison(err)
	}
}

impl fmt::Debug for FragmentReader {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("FragmentReader")
			.field("base", self.base.get_ref())
			.field("scope", &self.scope)
			.field("done", &self.done)
			.field("err", &self.err)
			.finish()
	}
}
