/*!
# Delegation base for reader and writer decorators

A decorator holds a [`DelegatingReader`] (or [`DelegatingWriter`]) around
the wrapped instance, implements the methods it changes itself and forwards
everything else to the base. The provided methods of [`XmlReader`], like
[`XmlReader::next_tag`], are written in terms of [`XmlReader::next`], so a
decorator which only replaces `next` gets consistent navigation for free.

[`EventFilter`] is the simplest such decorator: it drops events for which a
predicate returns false.

```
use xmlio::{Event, Tokenizer, XmlReader};
use xmlio::delegate::EventFilter;

let tok = Tokenizer::from_str("<a><!-- note --><b/></a>");
let mut r = EventFilter::new(tok, |ev: &Event| !matches!(ev, Event::Comment(..)));
let names: Vec<&'static str> = std::iter::from_fn(|| match r.next().unwrap() {
	Event::EndDocument(..) => None,
	ev => Some(ev.name()),
}).collect();
assert!(!names.contains(&"COMMENT"));
```
*/
use crate::error::*;
use crate::namespaces::{NamespaceContext, NamespaceSnapshot};
use crate::parser::Event;
use crate::reader::XmlReader;
use crate::writer::XmlWrite;

/// Reader which forwards every call to the wrapped reader.
#[derive(Debug)]
pub struct DelegatingReader<R> {
	inner: R,
}

impl<R> DelegatingReader<R> {
	pub fn new(inner: R) -> Self {
		Self{inner}
	}

	pub fn get_ref(&self) -> &R {
		&self.inner
	}

	pub fn get_mut(&mut self) -> &mut R {
		&mut self.inner
	}

	pub fn into_inner(self) -> R {
		self.inner
	}
}

impl<R: XmlReader> XmlReader for DelegatingReader<R> {
	fn next(&mut self) -> Result<Event> {
		self.inner.next()
	}

	fn current(&self) -> Option<&Event> {
		self.inner.current()
	}

	fn depth(&self) -> usize {
		self.inner.depth()
	}

	fn namespace_context(&self) -> NamespaceSnapshot {
		self.inner.namespace_context()
	}

	fn position(&self) -> Position {
		self.inner.position()
	}

	fn poison(&mut self, err: Error) -> Error {
		self.inner.poison(err)
	}
}

/// Reader which skips all events rejected by a predicate.
///
/// [`Event::EndDocument`] is never skipped.
pub struct EventFilter<R, F> {
	base: DelegatingReader<R>,
	keep: F,
	current: Option<Event>,
}

impl<R: XmlReader, F: FnMut(&Event) -> bool> EventFilter<R, F> {
	pub fn new(inner: R, keep: F) -> Self {
		Self{
			base: DelegatingReader::new(inner),
			keep,
			current: None,
		}
	}

	pub fn get_ref(&self) -> &R {
		self.base.get_ref()
	}

	pub fn into_inner(self) -> R {
		self.base.into_inner()
	}
}

impl<R: XmlReader, F: FnMut(&Event) -> bool> XmlReader for EventFilter<R, F> {
	fn next(&mut self) -> Result<Event> {
		loop {
			let ev = self.base.next()?;
			if matches!(ev, Event::EndDocument(..)) || (self.keep)(&ev) {
				self.current = Some(ev.clone());
				return Ok(ev)
			}
		}
	}

	fn current(&self) -> Option<&Event> {
		self.current.as_ref()
	}

	fn depth(&self) -> usize {
		self.base.depth()
	}

	fn namespace_context(&self) -> NamespaceSnapshot {
		self.base.namespace_context()
	}

	fn position(&self) -> Position {
		self.base.position()
	}

	fn poison(&mut self, err: Error) -> Error {
		self.base.poison(err)
	}
}

/// Writer which forwards every call to the wrapped writer.
#[derive(Debug)]
pub struct DelegatingWriter<W> {
	inner: W,
}

impl<W> DelegatingWriter<W> {
	pub fn new(inner: W) -> Self {
		Self{inner}
	}

	pub fn get_ref(&self) -> &W {
		&self.inner
	}

	pub fn get_mut(&mut self) -> &mut W {
		&mut self.inner
	}

	pub fn into_inner(self) -> W {
		self.inner
	}
}

impl<W: XmlWrite> XmlWrite for DelegatingWriter<W> {
	fn start_document(&mut self, encoding: Option<&str>, standalone: Option<bool>) -> Result<()> {
		self.inner.start_document(encoding, standalone)
	}

	fn end_document(&mut self) -> Result<()> {
		self.inner.end_document()
	}

	fn start_tag(&mut self, namespace: &str, local_name: &str) -> Result<()> {
		self.inner.start_tag(namespace, local_name)
	}

	fn start_tag_prefixed(&mut self, prefix: &str, namespace: &str, local_name: &str) -> Result<()> {
		self.inner.start_tag_prefixed(prefix, namespace, local_name)
	}

	fn namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
		self.inner.namespace(prefix, uri)
	}

	fn attribute(&mut self, namespace: &str, local_name: &str, value: &str) -> Result<()> {
		self.inner.attribute(namespace, local_name, value)
	}

	fn attribute_prefixed(&mut self, prefix: &str, namespace: &str, local_name: &str, value: &str) -> Result<()> {
		self.inner.attribute_prefixed(prefix, namespace, local_name, value)
	}

	fn end_tag(&mut self, namespace: &str, local_name: &str) -> Result<()> {
		self.inner.end_tag(namespace, local_name)
	}

	fn text(&mut self, text: &str) -> Result<()> {
		self.inner.text(text)
	}

	fn cdata(&mut self, text: &str) -> Result<()> {
		self.inner.cdata(text)
	}

	fn comment(&mut self, text: &str) -> Result<()> {
		self.inner.comment(text)
	}

	fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
		self.inner.processing_instruction(target, data)
	}

	fn doctype(&mut self, text: &str) -> Result<()> {
		self.inner.doctype(text)
	}

	fn depth(&self) -> usize {
		self.inner.depth()
	}

	fn namespace_context(&self) -> &dyn NamespaceContext {
		self.inner.namespace_context()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::parser::Tokenizer;
	use crate::writer::{copy_events, Writer};

	/// Decorator which only replaces `next`: drops all text.
	struct NoText<R> {
		base: DelegatingReader<R>,
	}

	impl<R: XmlReader> XmlReader for NoText<R> {
		fn next(&mut self) -> Result<Event> {
			loop {
				match self.base.next()? {
					Event::Text(..) => continue,
					ev => return Ok(ev),
				}
			}
		}

		fn current(&self) -> Option<&Event> {
			self.base.current()
		}

		fn depth(&self) -> usize {
			self.base.depth()
		}

		fn namespace_context(&self) -> NamespaceSnapshot {
			self.base.namespace_context()
		}

		fn position(&self) -> Position {
			self.base.position()
		}
	}

	#[test]
	fn delegating_reader_forwards_everything() {
		let mut r = DelegatingReader::new(Tokenizer::from_str("<a xmlns:p='urn:p'><p:b/></a>"));
		r.next().unwrap();
		r.next().unwrap();
		assert_eq!(r.depth(), 1);
		assert_eq!(r.namespace_context().resolve_uri("p"), Some("urn:p"));
		match r.next_tag().unwrap() {
			Event::StartElement(_, name, ..) => assert_eq!(name.namespace_str(), "urn:p"),
			other => panic!("unexpected event: {:?}", other),
		}
		assert!(matches!(r.current(), Some(Event::StartElement(..))));
		assert_eq!(r.position(), r.get_ref().position());
	}

	#[test]
	fn decorator_overriding_next_gets_next_tag() {
		// without the decorator, next_tag would fail on the text
		let tok = Tokenizer::from_str("<a>text<b/></a>");
		let mut r = NoText{base: DelegatingReader::new(tok)};
		r.next().unwrap();
		r.next().unwrap();
		match r.next_tag().unwrap() {
			Event::StartElement(_, name, ..) => assert_eq!(name.local_name, "b"),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(r.read_text().unwrap(), "");
	}

	#[test]
	fn event_filter_drops_rejected_events() {
		let tok = Tokenizer::from_str("<a><!--x--><?pi?><b/></a>");
		let mut r = EventFilter::new(tok, |ev: &Event| !matches!(ev, Event::Comment(..) | Event::ProcessingInstruction(..)));
		let mut names = Vec::new();
		loop {
			let ev = r.next().unwrap();
			names.push(ev.name());
			assert_eq!(r.current().map(|ev| ev.name()), Some(ev.name()));
			if let Event::EndDocument(..) = ev {
				break
			}
		}
		assert_eq!(names, vec!["START_DOCUMENT", "START_ELEMENT", "START_ELEMENT", "END_ELEMENT", "END_ELEMENT", "END_DOCUMENT"]);
	}

	#[test]
	fn event_filter_never_drops_end_document() {
		let tok = Tokenizer::from_str("<a/>");
		let mut r = EventFilter::new(tok, |_: &Event| false);
		assert!(matches!(r.next().unwrap(), Event::EndDocument(..)));
		assert!(matches!(r.next().unwrap(), Event::EndDocument(..)));
	}

	#[test]
	fn delegating_writer_inherits_provided_methods() {
		let mut w = DelegatingWriter::new(Writer::new(Vec::new()));
		w.smart_start_tag("", "urn:a", "a").unwrap();
		w.smart_start_tag("", "urn:a", "b").unwrap();
		assert_eq!(w.depth(), 2);
		assert_eq!(w.namespace_context().resolve_uri(""), Some("urn:a"));
		w.end_document().unwrap();
		assert_eq!(w.into_inner().into_inner(), b"<a xmlns=\"urn:a\"><b/></a>".to_vec());
	}

	#[test]
	fn delegating_writer_copies_events() {
		let mut tok = Tokenizer::from_str("<a x=\"1\"><!--c-->t</a>");
		let mut w = DelegatingWriter::new(Writer::new(Vec::new()));
		copy_events(&mut tok, &mut w).unwrap();
		assert_eq!(w.get_ref().get_ref(), &b"<a x=\"1\"><!--c-->t</a>".to_vec());
	}
}
