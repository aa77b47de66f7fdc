/*!
# Namespace bindings and scopes

Readers and writers keep track of the namespace prefixes in scope using a
[`NamespaceStack`]: a flat array of bindings plus the number of bindings
introduced at each depth. Opening an element increments the depth, closing
it truncates the array back to the state before the element, which restores
any outer binding a nested declaration shadowed.

Callers which need to hold on to a view of the bindings while parsing
continues receive a [`NamespaceSnapshot`] instead. Snapshots are persistent
chains of immutable scope nodes; extending one never changes what an older
snapshot reports.

Both implement the [`NamespaceContext`] lookup trait.

The `xml` and `xmlns` prefixes are reserved and always resolve to
[`XMLNS_XML`] and [`XMLNS_XMLNS`], whatever has been declared.
*/
use std::convert::TryFrom;
use std::fmt;

#[cfg(not(feature = "mt"))]
use std::rc::Rc;
#[cfg(feature = "mt")]
use std::sync::Arc;

use crate::strings::{CData, NCName};

/// Shared pointer used for namespace names and snapshot nodes.
///
/// An [`Rc`] by default, an `Arc` with the `mt` feature.
#[cfg(not(feature = "mt"))]
pub type RcPtr<T> = Rc<T>;
#[cfg(feature = "mt")]
pub type RcPtr<T> = Arc<T>;

/// Shared namespace URI.
pub type NamespaceName = RcPtr<CData>;

/// XML core namespace URI (for the `xml:` prefix)
pub const XMLNS_XML: &'static str = "http://www.w3.org/XML/1998/namespace";
/// XML namespace URI (for the `xmlns:` prefix)
pub const XMLNS_XMLNS: &'static str = "http://www.w3.org/2000/xmlns/";

pub const PREFIX_XML: &'static str = "xml";
pub const PREFIX_XMLNS: &'static str = "xmlns";

/// A prefix bound to a namespace name.
///
/// A `None` prefix is the default namespace. An empty URI is only valid for
/// the default namespace and undeclares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceBinding {
	pub prefix: Option<NCName>,
	pub uri: NamespaceName,
}

impl NamespaceBinding {
	pub fn new(prefix: Option<NCName>, uri: NamespaceName) -> Self {
		Self{prefix, uri}
	}

	/// Build a binding from plain strings; an empty prefix selects the
	/// default namespace.
	pub fn from_strs(prefix: &str, uri: &str) -> Result<Self, xmlio_validation::Error> {
		let prefix = if prefix.is_empty() {
			None
		} else {
			Some(NCName::try_from(prefix)?)
		};
		Ok(Self{prefix, uri: RcPtr::new(CData::try_from(uri)?)})
	}

	/// The prefix, with the empty string standing for the default namespace.
	pub fn prefix_str(&self) -> &str {
		match self.prefix.as_ref() {
			Some(p) => p.as_str(),
			None => "",
		}
	}

	pub fn uri_str(&self) -> &str {
		self.uri.as_str()
	}
}

impl fmt::Display for NamespaceBinding {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self.prefix.as_ref() {
			Some(p) => write!(f, "xmlns:{}={:?}", p, self.uri.as_str()),
			None => write!(f, "xmlns={:?}", self.uri.as_str()),
		}
	}
}

/**
Read access to namespace bindings in scope.

Prefixes are passed and returned as `&str`, with `""` standing for the
default namespace. A `None` URI means the null namespace (or an unbound
prefix).
*/
pub trait NamespaceContext {
	/// Iterate the visible and shadowed bindings, innermost first.
	///
	/// Reserved prefixes are not part of the iteration.
	fn innermost_first<'x>(&'x self) -> Box<dyn Iterator<Item = &'x NamespaceBinding> + 'x>;

	/// Resolve a prefix to its namespace URI.
	fn resolve_uri(&self, prefix: &str) -> Option<&str> {
		match prefix {
			PREFIX_XML => return Some(XMLNS_XML),
			PREFIX_XMLNS => return Some(XMLNS_XMLNS),
			_ => (),
		}
		let binding = self.innermost_first().find(|b| b.prefix_str() == prefix)?;
		if binding.uri.is_empty() {
			None
		} else {
			Some(binding.uri.as_str())
		}
	}

	/// Find the most recently declared prefix which is bound to `uri` and
	/// not shadowed by a deeper declaration.
	///
	/// For the null namespace (`""`), the default prefix is returned unless
	/// a default namespace is in scope.
	fn resolve_prefix(&self, uri: &str) -> Option<&str> {
		match uri {
			XMLNS_XML => return Some(PREFIX_XML),
			XMLNS_XMLNS => return Some(PREFIX_XMLNS),
			"" => {
				return match self.resolve_uri("") {
					None => Some(""),
					Some(_) => None,
				}
			}
			_ => (),
		}
		let mut seen: Vec<&str> = Vec::new();
		for binding in self.innermost_first() {
			let prefix = binding.prefix_str();
			if seen.contains(&prefix) {
				continue;
			}
			if binding.uri.as_str() == uri {
				return Some(prefix);
			}
			seen.push(prefix);
		}
		None
	}

	/// All prefixes currently bound to `uri`, innermost first.
	fn prefixes_for(&self, uri: &str) -> Vec<&str> {
		match uri {
			XMLNS_XML => return vec![PREFIX_XML],
			XMLNS_XMLNS => return vec![PREFIX_XMLNS],
			_ => (),
		}
		let mut seen: Vec<&str> = Vec::new();
		let mut result = Vec::new();
		for binding in self.innermost_first() {
			let prefix = binding.prefix_str();
			if seen.contains(&prefix) {
				continue;
			}
			seen.push(prefix);
			if binding.uri.as_str() == uri {
				result.push(prefix);
			}
		}
		result
	}

	/// The visible bindings, one per prefix, outermost first.
	fn bindings(&self) -> Vec<NamespaceBinding> {
		let mut result: Vec<NamespaceBinding> = Vec::new();
		for binding in self.innermost_first() {
			if result.iter().any(|b| b.prefix == binding.prefix) {
				continue;
			}
			result.push(binding.clone());
		}
		result.reverse();
		result
	}
}

/**
Flat, depth-scoped stack of namespace bindings.

Push is amortized O(1), and popping a depth truncates the array in one step.

```
use xmlio::{NamespaceBinding, NamespaceContext, NamespaceStack};

let mut stack = NamespaceStack::new();
stack.inc_depth();
stack.push_binding(NamespaceBinding::from_strs("a", "urn:outer").unwrap());
stack.inc_depth();
stack.push_binding(NamespaceBinding::from_strs("a", "urn:inner").unwrap());
assert_eq!(stack.resolve_uri("a"), Some("urn:inner"));
stack.dec_depth();
assert_eq!(stack.resolve_uri("a"), Some("urn:outer"));
```
*/
#[derive(Clone)]
pub struct NamespaceStack {
	bindings: Vec<NamespaceBinding>,
	counts: Vec<usize>,
	xml: NamespaceName,
	xmlns: NamespaceName,
}

impl NamespaceStack {
	pub fn new() -> Self {
		Self{
			bindings: Vec::new(),
			counts: Vec::new(),
			xml: RcPtr::new(CData::from_validated(XMLNS_XML)),
			xmlns: RcPtr::new(CData::from_validated(XMLNS_XMLNS)),
		}
	}

	/// Number of open depths.
	pub fn depth(&self) -> usize {
		self.counts.len()
	}

	/// Add a binding at the current depth.
	///
	/// Bindings pushed before the first [`inc_depth`](Self::inc_depth) form
	/// the root scope, which is never popped.
	pub fn push_binding(&mut self, binding: NamespaceBinding) {
		self.bindings.push(binding);
		if let Some(count) = self.counts.last_mut() {
			*count += 1;
		}
	}

	pub fn inc_depth(&mut self) {
		self.counts.push(0);
	}

	/// Close the current depth and drop the bindings declared in it.
	pub fn dec_depth(&mut self) {
		if let Some(count) = self.counts.pop() {
			let len = self.bindings.len() - count;
			self.bindings.truncate(len);
		}
	}

	/// Bindings declared at the current depth, in declaration order.
	pub fn current_declarations(&self) -> &[NamespaceBinding] {
		let count = self.counts.last().copied().unwrap_or(self.bindings.len());
		&self.bindings[self.bindings.len() - count..]
	}

	/// Whether the current depth already declares `prefix`.
	pub fn is_declared_here(&self, prefix: &str) -> bool {
		self.current_declarations().iter().any(|b| b.prefix_str() == prefix)
	}

	/// Resolve a prefix to the shared namespace name.
	///
	/// `None` is returned for unbound prefixes and for an unset default
	/// namespace alike.
	pub fn lookup(&self, prefix: Option<&str>) -> Option<&NamespaceName> {
		match prefix {
			Some(PREFIX_XML) => return Some(&self.xml),
			Some(PREFIX_XMLNS) => return Some(&self.xmlns),
			_ => (),
		}
		let prefix = prefix.unwrap_or("");
		let binding = self.bindings.iter().rev().find(|b| b.prefix_str() == prefix)?;
		if binding.uri.is_empty() {
			None
		} else {
			Some(&binding.uri)
		}
	}

	/// Whether `prefix` is declared anywhere in scope, including the
	/// reserved prefixes and empty default declarations.
	pub fn is_bound(&self, prefix: &str) -> bool {
		prefix == PREFIX_XML || prefix == PREFIX_XMLNS || self.bindings.iter().any(|b| b.prefix_str() == prefix)
	}

	/// Take a persistent snapshot of the visible bindings.
	pub fn snapshot(&self) -> NamespaceSnapshot {
		NamespaceSnapshot::root(self.bindings())
	}

	/// Clear all bindings and depths.
	pub fn clear(&mut self) {
		self.bindings.clear();
		self.counts.clear();
	}
}

impl Default for NamespaceStack {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for NamespaceStack {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("NamespaceStack")
			.field("bindings", &self.bindings)
			.field("counts", &self.counts)
			.finish()
	}
}

impl NamespaceContext for NamespaceStack {
	fn innermost_first<'x>(&'x self) -> Box<dyn Iterator<Item = &'x NamespaceBinding> + 'x> {
		Box::new(self.bindings.iter().rev())
	}
}

#[derive(Debug)]
struct ScopeNode {
	bindings: Vec<NamespaceBinding>,
	parent: Option<RcPtr<ScopeNode>>,
}

/**
Immutable namespace scope which shares its ancestry with other snapshots.

Each call to [`push`](Self::push) creates a new node pointing at the
enclosing scope; [`parent`](Self::parent) returns that enclosing scope
again. Cloning is O(1).
*/
#[derive(Debug, Clone, Default)]
pub struct NamespaceSnapshot {
	head: Option<RcPtr<ScopeNode>>,
}

impl NamespaceSnapshot {
	/// An empty scope with no bindings.
	pub fn empty() -> Self {
		Self{head: None}
	}

	/// A scope containing exactly the given bindings.
	pub fn root(bindings: Vec<NamespaceBinding>) -> Self {
		Self::empty().push(bindings)
	}

	/// Return a nested scope declaring `bindings`.
	pub fn push(&self, bindings: Vec<NamespaceBinding>) -> Self {
		Self{
			head: Some(RcPtr::new(ScopeNode{
				bindings,
				parent: self.head.clone(),
			})),
		}
	}

	/// Return the enclosing scope.
	///
	/// The parent of the empty scope is the empty scope.
	pub fn parent(&self) -> Self {
		Self{
			head: self.head.as_ref().and_then(|node| node.parent.clone()),
		}
	}

	/// Bindings declared by the innermost scope node.
	pub fn declarations(&self) -> &[NamespaceBinding] {
		match self.head.as_ref() {
			Some(node) => &node.bindings,
			None => &[],
		}
	}

	/// Number of nodes in the chain.
	pub fn depth(&self) -> usize {
		let mut depth = 0;
		let mut node = self.head.as_ref();
		while let Some(n) = node {
			depth += 1;
			node = n.parent.as_ref();
		}
		depth
	}
}

struct ChainIter<'x> {
	node: Option<&'x ScopeNode>,
	inner: std::iter::Rev<std::slice::Iter<'x, NamespaceBinding>>,
}

impl<'x> Iterator for ChainIter<'x> {
	type Item = &'x NamespaceBinding;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(b) = self.inner.next() {
				return Some(b);
			}
			let node = self.node?;
			self.inner = node.bindings.iter().rev();
			self.node = node.parent.as_deref();
		}
	}
}

impl NamespaceContext for NamespaceSnapshot {
	fn innermost_first<'x>(&'x self) -> Box<dyn Iterator<Item = &'x NamespaceBinding> + 'x> {
		let empty: &'x [NamespaceBinding] = &[];
		Box::new(ChainIter{
			node: self.head.as_deref(),
			inner: empty.iter().rev(),
		})
	}
}
