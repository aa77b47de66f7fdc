use std::fmt;

use crate::namespaces::{NamespaceBinding, NamespaceName};
use crate::strings::*;

/**
# XML version number

Only version 1.0 is supported.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XMLVersion {
	/// XML Version 1.0
	V1_0,
}

/// Carry measurement information about the event
///
/// In contrast to tokens (cf. [`crate::lexer::TokenMetrics`]), events are
/// always consecutive: the lengths of all events of a document add up to the
/// number of (decoded) bytes consumed.
///
/// The depth is the nesting level the event was reported at: the new depth
/// for [`Event::StartElement`], the closing depth for
/// [`Event::EndElement`] and the current depth for everything else.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct EventMetrics {
	pub(crate) len: usize,
	pub(crate) depth: usize,
}

impl EventMetrics {
	/// Create new event metrics
	pub const fn new(len: usize, depth: usize) -> EventMetrics {
		EventMetrics{len, depth}
	}

	/// Get the number of bytes used to generate this event.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Nesting level at which the event was reported.
	pub fn depth(&self) -> usize {
		self.depth
	}
}

/// Namespace-resolved element or attribute name.
///
/// Equality includes the prefix; use [`QName::matches`] to compare expanded
/// names only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
	/// Namespace URI, or `None` for the null namespace.
	pub namespace: Option<NamespaceName>,
	/// Prefix used in the source, or `None` for unprefixed names.
	pub prefix: Option<NCName>,
	pub local_name: NCName,
}

impl QName {
	pub fn new(namespace: Option<NamespaceName>, prefix: Option<NCName>, local_name: NCName) -> QName {
		QName{namespace, prefix, local_name}
	}

	/// The namespace URI, with the null namespace as empty string.
	pub fn namespace_str(&self) -> &str {
		match self.namespace.as_ref() {
			Some(ns) => ns.as_str(),
			None => "",
		}
	}

	/// Compare the expanded name against a namespace URI and a local name.
	///
	/// `None` and `Some("")` both select the null namespace.
	pub fn matches(&self, namespace: Option<&str>, local_name: &str) -> bool {
		self.namespace_str() == namespace.unwrap_or("") && self.local_name == local_name
	}

	/// Reassemble the name as written in the source.
	pub fn qualified_name(&self) -> Name {
		self.local_name.with_prefix(self.prefix.as_ref())
	}
}

/// Displays the expanded name in `{uri}local` notation.
impl fmt::Display for QName {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self.namespace.as_ref() {
			Some(ns) => write!(f, "{{{}}}{}", ns.as_str(), self.local_name),
			None => f.write_str(&self.local_name),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: QName,
	pub value: CData,
}

/// Contents of the XML declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
	pub version: XMLVersion,
	/// The `encoding` pseudo-attribute as written.
	pub encoding: Option<CData>,
	pub standalone: Option<bool>,
}

/**
# Structural event

Events are produced by [`crate::XmlReader`] implementations and consumed by
[`crate::XmlWrite::write_event`].

Whitespace-only text before and after the document element is reported as
[`Event::IgnorableWhitespace`]; inside elements, all character data is
[`Event::Text`] (or [`Event::CData`] for CDATA sections). Long runs of text
may be split over several events.
*/
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
	/// Start of the document, with the XML declaration if present.
	StartDocument(EventMetrics, Option<XmlDeclaration>),
	/// End of the document. Once reported, it is reported forever.
	EndDocument(EventMetrics),
	/// Element start with its resolved name, the attributes (without
	/// namespace declarations) and the namespace declarations made on it.
	StartElement(EventMetrics, QName, Vec<Attribute>, Vec<NamespaceBinding>),
	/// End of the element; an empty element reports one as well.
	EndElement(EventMetrics, QName),
	Text(EventMetrics, CData),
	CData(EventMetrics, CData),
	Comment(EventMetrics, CData),
	ProcessingInstruction(EventMetrics, Name, CData),
	/// The document type declaration, verbatim and uninterpreted.
	DoctypeDecl(EventMetrics, CData),
	IgnorableWhitespace(EventMetrics, CData),
}

impl Event {
	pub const NAME_START_DOCUMENT: &'static str = "START_DOCUMENT";
	pub const NAME_END_DOCUMENT: &'static str = "END_DOCUMENT";
	pub const NAME_START_ELEMENT: &'static str = "START_ELEMENT";
	pub const NAME_END_ELEMENT: &'static str = "END_ELEMENT";
	pub const NAME_TEXT: &'static str = "TEXT";
	pub const NAME_CDATA: &'static str = "CDATA";
	pub const NAME_COMMENT: &'static str = "COMMENT";
	pub const NAME_PROCESSING_INSTRUCTION: &'static str = "PROCESSING_INSTRUCTION";
	pub const NAME_DOCTYPE_DECL: &'static str = "DOCTYPE_DECL";
	pub const NAME_IGNORABLE_WHITESPACE: &'static str = "IGNORABLE_WHITESPACE";

	/// Name of the event kind, for messages.
	pub fn name(&self) -> &'static str {
		match self {
			Self::StartDocument(..) => Self::NAME_START_DOCUMENT,
			Self::EndDocument(..) => Self::NAME_END_DOCUMENT,
			Self::StartElement(..) => Self::NAME_START_ELEMENT,
			Self::EndElement(..) => Self::NAME_END_ELEMENT,
			Self::Text(..) => Self::NAME_TEXT,
			Self::CData(..) => Self::NAME_CDATA,
			Self::Comment(..) => Self::NAME_COMMENT,
			Self::ProcessingInstruction(..) => Self::NAME_PROCESSING_INSTRUCTION,
			Self::DoctypeDecl(..) => Self::NAME_DOCTYPE_DECL,
			Self::IgnorableWhitespace(..) => Self::NAME_IGNORABLE_WHITESPACE,
		}
	}

	pub fn metrics(&self) -> &EventMetrics {
		match self {
			Self::StartDocument(m, ..) => m,
			Self::EndDocument(m) => m,
			Self::StartElement(m, ..) => m,
			Self::EndElement(m, ..) => m,
			Self::Text(m, ..) => m,
			Self::CData(m, ..) => m,
			Self::Comment(m, ..) => m,
			Self::ProcessingInstruction(m, ..) => m,
			Self::DoctypeDecl(m, ..) => m,
			Self::IgnorableWhitespace(m, ..) => m,
		}
	}

	fn metrics_mut(&mut self) -> &mut EventMetrics {
		match self {
			Self::StartDocument(m, ..) => m,
			Self::EndDocument(m) => m,
			Self::StartElement(m, ..) => m,
			Self::EndElement(m, ..) => m,
			Self::Text(m, ..) => m,
			Self::CData(m, ..) => m,
			Self::Comment(m, ..) => m,
			Self::ProcessingInstruction(m, ..) => m,
			Self::DoctypeDecl(m, ..) => m,
			Self::IgnorableWhitespace(m, ..) => m,
		}
	}

	pub fn depth(&self) -> usize {
		self.metrics().depth
	}

	/// Return the event with its depth replaced.
	pub fn with_depth(mut self, depth: usize) -> Event {
		self.metrics_mut().depth = depth;
		self
	}

	/// True for character data which consists only of XML whitespace.
	pub fn is_whitespace(&self) -> bool {
		match self {
			Self::Text(_, t) | Self::CData(_, t) | Self::IgnorableWhitespace(_, t) => xmlio_validation::is_xml_whitespace(t),
			_ => false,
		}
	}

	/// The element name of start and end events.
	pub fn qname(&self) -> Option<&QName> {
		match self {
			Self::StartElement(_, name, ..) | Self::EndElement(_, name) => Some(name),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::convert::TryFrom;

	use crate::namespaces::RcPtr;

	fn qname(ns: Option<&str>, prefix: Option<&str>, local: &str) -> QName {
		QName::new(
			ns.map(|ns| RcPtr::new(CData::try_from(ns).unwrap())),
			prefix.map(|p| NCName::try_from(p).unwrap()),
			NCName::try_from(local).unwrap(),
		)
	}

	#[test]
	fn qname_display_uses_expanded_form() {
		assert_eq!(qname(Some("urn:a"), Some("a"), "x").to_string(), "{urn:a}x");
		assert_eq!(qname(None, None, "x").to_string(), "x");
	}

	#[test]
	fn qname_matches_ignores_prefix() {
		let n = qname(Some("urn:a"), Some("a"), "x");
		assert!(n.matches(Some("urn:a"), "x"));
		assert!(!n.matches(None, "x"));
		let n = qname(None, None, "x");
		assert!(n.matches(Some(""), "x"));
		assert!(n.matches(None, "x"));
		assert_eq!(qname(Some("urn:a"), Some("a"), "x").qualified_name(), "a:x");
	}

	#[test]
	fn whitespace_classification() {
		let m = EventMetrics::new(0, 1);
		assert!(Event::Text(m, CData::try_from(" \n\t").unwrap()).is_whitespace());
		assert!(!Event::Text(m, CData::try_from(" x ").unwrap()).is_whitespace());
		assert!(!Event::Comment(m, CData::try_from(" ").unwrap()).is_whitespace());
	}

	#[test]
	fn with_depth_replaces_depth_only() {
		let ev = Event::Text(EventMetrics::new(3, 2), CData::try_from("x").unwrap());
		let ev = ev.with_depth(1);
		assert_eq!(ev.depth(), 1);
		assert_eq!(ev.metrics().len(), 3);
		assert_eq!(ev.name(), "TEXT");
	}
}
