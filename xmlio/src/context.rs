use std::fmt;

#[cfg(all(feature = "shared_ns", feature = "mt"))]
use std::sync::{Mutex, MutexGuard, Weak};
#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
use std::rc::Weak;
#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
use std::cell::{RefCell, RefMut};

use crate::namespaces::{NamespaceName, RcPtr};
use crate::strings::CData;

#[cfg(feature = "shared_ns")]
type CDataWeakSet = weak_table::WeakHashSet<Weak<CData>>;

/**
# Shared context for multiple tokenizers

The context allows tokenizers to share namespace names. Applications which
parse many documents using the same handful of namespaces (protocol streams,
configuration files) end up holding a single allocation per namespace URI
instead of one per element.

Interning only happens if the crate is built with the `shared_ns` feature;
otherwise [`Context::intern`] simply wraps the value.

The context is internally mutable and can be shared between tokenizers by
reference counted pointer. With the `mt` feature it is `Send` and `Sync`.
*/
pub struct Context {
	#[cfg(all(feature = "shared_ns", feature = "mt"))]
	nss: Mutex<CDataWeakSet>,
	#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
	nss: RefCell<CDataWeakSet>,
}

impl Context {
	/// Create a new context
	pub fn new() -> Context {
		Context{
			#[cfg(feature = "shared_ns")]
			nss: weak_table::WeakHashSet::new().into(),
		}
	}

	#[cfg(all(feature = "shared_ns", feature = "mt"))]
	fn lock_nss<'a>(&'a self) -> MutexGuard<'a, CDataWeakSet> {
		// the set stays consistent even if a holder panicked
		self.nss.lock().unwrap_or_else(|e| e.into_inner())
	}

	#[cfg(all(feature = "shared_ns", not(feature = "mt")))]
	fn lock_nss<'a>(&'a self) -> RefMut<'a, CDataWeakSet> {
		self.nss.borrow_mut()
	}

	/// Intern a namespace name.
	///
	/// Returns a pointer to an existing equal value if one is still alive.
	/// Values are dropped from the context lazily once the last pointer to
	/// them is gone.
	pub fn intern(&self, ns: CData) -> NamespaceName {
		#[cfg(feature = "shared_ns")]
		{
			let mut nss = self.lock_nss();
			if let Some(ptr) = nss.get(ns.as_str()) {
				return ptr;
			}
			let ptr = RcPtr::new(ns);
			nss.insert(ptr.clone());
			ptr
		}
		#[cfg(not(feature = "shared_ns"))]
		RcPtr::new(ns)
	}

	/// Remove all expired names from storage and shrink it.
	pub fn release_temporaries(&self) {
		#[cfg(feature = "shared_ns")]
		{
			let mut nss = self.lock_nss();
			nss.remove_expired();
			nss.shrink_to_fit();
		}
	}

	/// Return the number of names held, including expired ones which were
	/// not collected yet.
	///
	/// Always zero without `shared_ns`.
	pub fn len(&self) -> usize {
		#[cfg(feature = "shared_ns")]
		{
			self.lock_nss().len()
		}
		#[cfg(not(feature = "shared_ns"))]
		0
	}
}

impl Default for Context {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Context {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		let mut f = f.debug_struct("Context");
		f.field("instance", &(self as *const Context));
		#[cfg(feature = "shared_ns")]
		{
			f.field("nss.len()", &self.lock_nss().len());
		}
		f.finish()
	}
}
