/*!
# Pull reader contract

[`XmlReader`] is the interface every event source of this crate implements:
the [`Tokenizer`](crate::Tokenizer), the
[`FragmentReader`](crate::fragment::FragmentReader) and the decorators built
on [`DelegatingReader`](crate::delegate::DelegatingReader).

Only [`XmlReader::next`] and a few accessors have to be implemented. The
navigation helpers ([`next_tag`](XmlReader::next_tag),
[`skip_element`](XmlReader::skip_element), [`read_text`](XmlReader::read_text)
and [`require_start`](XmlReader::require_start)) are provided in terms of
`next`, so a decorator which changes `next` changes them consistently.
*/
use crate::error::*;
use crate::namespaces::NamespaceSnapshot;
use crate::parser::Event;

const EXPECTED_TAG: &'static str = "START_ELEMENT or END_ELEMENT";

/// Source of structural XML events.
pub trait XmlReader {
	/// Read the next event.
	///
	/// After [`Event::EndDocument`] has been returned, every further call
	/// returns it again. After an error, every further call returns the same
	/// error.
	fn next(&mut self) -> Result<Event>;

	/// The event most recently returned by [`next`](Self::next).
	fn current(&self) -> Option<&Event>;

	/// Nesting depth after the most recent event.
	///
	/// This equals the depth carried by the event, except that elements are
	/// only left on the call after their end event.
	fn depth(&self) -> usize;

	/// Snapshot of the namespace bindings in scope at the current event.
	///
	/// The snapshot does not change when the reader advances.
	fn namespace_context(&self) -> NamespaceSnapshot;

	/// Input position after the current event.
	fn position(&self) -> Position;

	/// Record a failure detected outside of [`next`](Self::next) so that
	/// further reads fail too.
	///
	/// Returns the error for convenience.
	fn poison(&mut self, err: Error) -> Error {
		err
	}

	/// Advance to the next start or end tag.
	///
	/// Whitespace-only text, ignorable whitespace, comments and processing
	/// instructions are skipped. Any other event fails with
	/// [`StructureError::UnexpectedEvent`] and poisons the reader.
	fn next_tag(&mut self) -> Result<Event> {
		loop {
			let ev = self.next()?;
			match ev {
				Event::StartElement(..) | Event::EndElement(..) => return Ok(ev),
				Event::Comment(..) | Event::ProcessingInstruction(..) | Event::IgnorableWhitespace(..) => (),
				Event::Text(..) | Event::CData(..) if ev.is_whitespace() => (),
				other => {
					let err = StructureError::UnexpectedEvent{
						expected: EXPECTED_TAG,
						actual: other.name(),
					};
					return Err(self.poison(err.into()))
				},
			}
		}
	}

	/// Consume the rest of the element the reader is positioned on.
	///
	/// The current event must be a start tag; afterwards, the current event
	/// is the matching end tag.
	fn skip_element(&mut self) -> Result<()> {
		let target = match self.current() {
			Some(Event::StartElement(m, ..)) => m.depth(),
			Some(other) => {
				let err = StructureError::UnexpectedEvent{
					expected: Event::NAME_START_ELEMENT,
					actual: other.name(),
				};
				return Err(self.poison(err.into()))
			},
			None => return Err(self.poison(Error::state("no current event"))),
		};
		loop {
			match self.next()? {
				Event::EndElement(m, _) if m.depth() == target => return Ok(()),
				Event::EndDocument(..) => return Err(self.poison(Error::state("end of document inside element"))),
				_ => (),
			}
		}
	}

	/// Read the text content of the current element up to its end tag.
	///
	/// Comments and processing instructions are skipped. A child element is
	/// a [`StructureError::UnexpectedEvent`].
	fn read_text(&mut self) -> Result<String> {
		let mut text = String::new();
		loop {
			match self.next()? {
				Event::Text(_, t) | Event::CData(_, t) => text.push_str(&t),
				Event::Comment(..) | Event::ProcessingInstruction(..) => (),
				Event::EndElement(..) => return Ok(text),
				other => {
					let err = StructureError::UnexpectedEvent{
						expected: "TEXT or END_ELEMENT",
						actual: other.name(),
					};
					return Err(self.poison(err.into()))
				},
			}
		}
	}

	/// Advance to the next tag and require it to be a start tag with the
	/// given expanded name.
	///
	/// `None` and `Some("")` both select the null namespace.
	fn require_start(&mut self, namespace: Option<&str>, local_name: &str) -> Result<Event> {
		let ev = self.next_tag()?;
		let err = match &ev {
			Event::StartElement(_, name, ..) if name.matches(namespace, local_name) => return Ok(ev),
			Event::StartElement(_, name, ..) => StructureError::ElementMismatch{
				expected: match namespace {
					Some(ns) if ns.len() > 0 => format!("{{{}}}{}", ns, local_name),
					_ => local_name.to_string(),
				},
				actual: name.to_string(),
			},
			other => StructureError::UnexpectedEvent{
				expected: Event::NAME_START_ELEMENT,
				actual: other.name(),
			},
		};
		Err(self.poison(err.into()))
	}
}

impl<R: XmlReader + ?Sized> XmlReader for &mut R {
	fn next(&mut self) -> Result<Event> {
		(**self).next()
	}

	fn current(&self) -> Option<&Event> {
		(**self).current()
	}

	fn depth(&self) -> usize {
		(**self).depth()
	}

	fn namespace_context(&self) -> NamespaceSnapshot {
		(**self).namespace_context()
	}

	fn position(&self) -> Position {
		(**self).position()
	}

	fn poison(&mut self, err: Error) -> Error {
		(**self).poison(err)
	}

	fn next_tag(&mut self) -> Result<Event> {
		(**self).next_tag()
	}
}

impl<R: XmlReader + ?Sized> XmlReader for Box<R> {
	fn next(&mut self) -> Result<Event> {
		(**self).next()
	}

	fn current(&self) -> Option<&Event> {
		(**self).current()
	}

	fn depth(&self) -> usize {
		(**self).depth()
	}

	fn namespace_context(&self) -> NamespaceSnapshot {
		(**self).namespace_context()
	}

	fn position(&self) -> Position {
		(**self).position()
	}

	fn poison(&mut self, err: Error) -> Error {
		(**self).poison(err)
	}

	fn next_tag(&mut self) -> Result<Event> {
		(**self).next_tag()
	}
}
