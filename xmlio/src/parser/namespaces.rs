/*!
# Namespace resolution for element headers

The [`NamespaceResolver`] turns the raw name and attributes of an element
header into a resolved [`QName`], the remaining [`Attribute`]s and the
namespace declarations made on the element.

Declarations are processed before any name of the header is resolved, so a
declaration applies to the element carrying it.
*/
use xmlio_validation::Error as ValidationError;

use crate::context::Context;
use crate::error::*;
use crate::namespaces::{
	NamespaceBinding, NamespaceName, NamespaceStack, RcPtr, PREFIX_XML, PREFIX_XMLNS, XMLNS_XML,
	XMLNS_XMLNS,
};
use crate::strings::*;

use super::common::{Attribute, QName};

fn split(name: &Name, ctx: &'static str, pos: Position) -> Result<(Option<NCName>, NCName)> {
	name.split_name().map_err(|e| {
		let e = match e {
			ValidationError::InvalidChar(':') => NWFError::MultiColonName(ctx),
			ValidationError::EmptyName => NWFError::EmptyNamePart(ctx),
			_ => NWFError::InvalidLocalName(ctx),
		};
		Error::nwf(e, pos)
	})
}

pub(crate) struct NamespaceResolver {
	stack: NamespaceStack,
	ctx: RcPtr<Context>,
}

impl NamespaceResolver {
	pub(crate) fn new(ctx: RcPtr<Context>) -> Self {
		Self{
			stack: NamespaceStack::new(),
			ctx,
		}
	}

	pub(crate) fn stack(&self) -> &NamespaceStack {
		&self.stack
	}

	pub(crate) fn context(&self) -> &RcPtr<Context> {
		&self.ctx
	}

	fn declare(&mut self, prefix: Option<NCName>, value: CData, pos: Position) -> Result<()> {
		let reserved = Error::nwf(NWFError::ReservedNamespacePrefix, pos);
		match prefix.as_ref().map(|p| p.as_str()) {
			Some(PREFIX_XMLNS) => return Err(reserved),
			Some(PREFIX_XML) if value != XMLNS_XML => return Err(reserved),
			Some(PREFIX_XML) => (),
			_ if value == XMLNS_XML || value == XMLNS_XMLNS => return Err(reserved),
			Some(_) if value.is_empty() => return Err(Error::nwf(NWFError::EmptyNamespaceUri, pos)),
			_ => (),
		}
		let uri = self.ctx.intern(value);
		self.stack.push_binding(NamespaceBinding::new(prefix, uri));
		Ok(())
	}

	fn lookup(&self, prefix: Option<&NCName>, ctx: &'static str, pos: Position) -> Result<Option<NamespaceName>> {
		match prefix {
			None => Ok(self.stack.lookup(None).cloned()),
			Some(p) => match self.stack.lookup(Some(p.as_str())) {
				Some(uri) => Ok(Some(uri.clone())),
				None => Err(Error::nwf(NWFError::UndeclaredNamespacePrefix(ctx), pos)),
			},
		}
	}

	/// Open a new scope for an element and resolve its header.
	pub(crate) fn start_element(
		&mut self,
		name: Name,
		attributes: Vec<(Name, CData)>,
		pos: Position,
	) -> Result<(QName, Vec<Attribute>, Vec<NamespaceBinding>)> {
		self.stack.inc_depth();

		for (i, (attr_name, _)) in attributes.iter().enumerate() {
			if attributes[..i].iter().any(|(other, _)| other == attr_name) {
				return Err(Error::wf(WFError::DuplicateAttribute, pos))
			}
		}

		let mut plain = Vec::with_capacity(attributes.len());
		for (attr_name, value) in attributes {
			if attr_name == PREFIX_XMLNS {
				self.declare(None, value, pos)?;
				continue;
			}
			let (prefix, local) = split(&attr_name, ERRCTX_ATTVAL, pos)?;
			match prefix {
				Some(p) if p == PREFIX_XMLNS => self.declare(Some(local), value, pos)?,
				prefix => plain.push((prefix, local, value)),
			}
		}

		let (prefix, local) = split(&name, ERRCTX_ELEMENT, pos)?;
		if prefix.as_ref().map(|p| p == PREFIX_XMLNS).unwrap_or(false) {
			return Err(Error::nwf(NWFError::ReservedNamespacePrefix, pos))
		}
		let namespace = self.lookup(prefix.as_ref(), ERRCTX_ELEMENT, pos)?;
		let qname = QName::new(namespace, prefix, local);

		let mut resolved: Vec<Attribute> = Vec::with_capacity(plain.len());
		for (prefix, local, value) in plain {
			// unprefixed attributes are never in the default namespace
			let namespace = match prefix.as_ref() {
				Some(_) => self.lookup(prefix.as_ref(), ERRCTX_ATTVAL, pos)?,
				None => None,
			};
			let name = QName::new(namespace, prefix, local);
			if resolved.iter().any(|other| other.name.namespace == name.namespace && other.name.local_name == name.local_name) {
				return Err(Error::wf(WFError::DuplicateAttribute, pos))
			}
			resolved.push(Attribute{name, value});
		}

		Ok((qname, resolved, self.stack.current_declarations().to_vec()))
	}

	/// Close the innermost element scope.
	pub(crate) fn end_element(&mut self) {
		self.stack.dec_depth();
	}
}

impl Default for NamespaceResolver {
	fn default() -> Self {
		Self::new(RcPtr::new(Context::new()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::convert::TryFrom;

	use crate::namespaces::NamespaceContext;

	fn n(s: &str) -> Name {
		Name::try_from(s).unwrap()
	}

	fn v(s: &str) -> CData {
		CData::try_from(s).unwrap()
	}

	fn start(r: &mut NamespaceResolver, name: &str, attrs: &[(&str, &str)]) -> Result<(QName, Vec<Attribute>, Vec<NamespaceBinding>)> {
		r.start_element(n(name), attrs.iter().map(|(k, val)| (n(k), v(val))).collect(), Position::START)
	}

	#[test]
	fn declarations_apply_to_their_own_element() {
		let mut r = NamespaceResolver::default();
		let (name, attrs, decls) = start(&mut r, "a:x", &[("a:y", "1"), ("xmlns:a", "urn:a")]).unwrap();
		assert_eq!(name.namespace_str(), "urn:a");
		assert_eq!(name.prefix.as_ref().unwrap(), "a");
		assert_eq!(attrs.len(), 1);
		assert_eq!(attrs[0].name.namespace_str(), "urn:a");
		assert_eq!(decls.len(), 1);
		assert_eq!(decls[0].prefix_str(), "a");
	}

	#[test]
	fn default_namespace_does_not_apply_to_attributes() {
		let mut r = NamespaceResolver::default();
		let (name, attrs, _) = start(&mut r, "x", &[("xmlns", "urn:d"), ("y", "1")]).unwrap();
		assert_eq!(name.namespace_str(), "urn:d");
		assert!(attrs[0].name.namespace.is_none());
	}

	#[test]
	fn end_element_restores_outer_scope() {
		let mut r = NamespaceResolver::default();
		start(&mut r, "x", &[("xmlns:a", "urn:one")]).unwrap();
		start(&mut r, "x", &[("xmlns:a", "urn:two")]).unwrap();
		assert_eq!(r.stack().resolve_uri("a"), Some("urn:two"));
		r.end_element();
		assert_eq!(r.stack().resolve_uri("a"), Some("urn:one"));
	}

	#[test]
	fn rejects_undeclared_prefix() {
		let mut r = NamespaceResolver::default();
		match start(&mut r, "a:x", &[]) {
			Err(Error::NotNamespaceWellFormed(NWFError::UndeclaredNamespacePrefix(ERRCTX_ELEMENT), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		let mut r = NamespaceResolver::default();
		match start(&mut r, "x", &[("b:y", "1")]) {
			Err(Error::NotNamespaceWellFormed(NWFError::UndeclaredNamespacePrefix(ERRCTX_ATTVAL), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn rejects_duplicate_attributes_after_resolution() {
		let mut r = NamespaceResolver::default();
		match start(&mut r, "x", &[("xmlns:a", "urn:a"), ("xmlns:b", "urn:a"), ("a:y", "1"), ("b:y", "2")]) {
			Err(Error::NotWellFormed(WFError::DuplicateAttribute, _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn rejects_duplicate_raw_attributes() {
		let mut r = NamespaceResolver::default();
		match start(&mut r, "x", &[("y", "1"), ("y", "2")]) {
			Err(Error::NotWellFormed(WFError::DuplicateAttribute, _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn rejects_reserved_bindings() {
		for attrs in &[
			&[("xmlns:xmlns", "urn:x")][..],
			&[("xmlns:xml", "urn:x")][..],
			&[("xmlns:foo", XMLNS_XML)][..],
			&[("xmlns", XMLNS_XMLNS)][..],
		] {
			let mut r = NamespaceResolver::default();
			match start(&mut r, "x", attrs) {
				Err(Error::NotNamespaceWellFormed(NWFError::ReservedNamespacePrefix, _)) => (),
				other => panic!("unexpected result for {:?}: {:?}", attrs, other),
			}
		}
		let mut r = NamespaceResolver::default();
		start(&mut r, "x", &[("xmlns:xml", XMLNS_XML)]).unwrap();
	}

	#[test]
	fn rejects_empty_prefixed_namespace_but_allows_default_undeclaration() {
		let mut r = NamespaceResolver::default();
		match start(&mut r, "x", &[("xmlns:a", "")]) {
			Err(Error::NotNamespaceWellFormed(NWFError::EmptyNamespaceUri, _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		let mut r = NamespaceResolver::default();
		start(&mut r, "x", &[("xmlns", "urn:d")]).unwrap();
		let (name, _, _) = start(&mut r, "y", &[("xmlns", "")]).unwrap();
		assert!(name.namespace.is_none());
	}

	#[test]
	fn rejects_malformed_qualified_names() {
		let mut r = NamespaceResolver::default();
		match start(&mut r, "a:b:c", &[]) {
			Err(Error::NotNamespaceWellFormed(NWFError::MultiColonName(_), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		let mut r = NamespaceResolver::default();
		match start(&mut r, "x", &[(":y", "1")]) {
			Err(Error::NotNamespaceWellFormed(NWFError::EmptyNamePart(_), _)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn xml_prefix_resolves_without_declaration() {
		let mut r = NamespaceResolver::default();
		let (_, attrs, _) = start(&mut r, "x", &[("xml:lang", "en")]).unwrap();
		assert_eq!(attrs[0].name.namespace_str(), XMLNS_XML);
	}
}
