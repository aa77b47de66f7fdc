/*!
# Strongly-typed strings for use with XML 1.0 documents

This module defines string types which represent pieces of text as they may
occur in XML documents. Values of these types are checked to conform to the
respective grammar production, which allows the tokenizer to hand checked
data to the application and the writer to skip re-validation.

- [`Name`] represents the `Name` production and is used for element and
  attribute names before prefix expansion and for processing instruction
  targets.
- [`NCName`] represents a `Name` without colons; it is used for local names
  and prefixes.
- [`CData`] represents a string of XML `Char`s, used for attribute values,
  text and namespace URIs. It never contains unexpanded references.

Owned values are constructed through [`std::convert::TryFrom`] from `&str`,
[`String`] and [`smartstring::alias::String`]. Lossless widening conversions
([`NCName`] to [`Name`], either name to [`CData`]) are available through
`From`.
*/
use std::borrow::Borrow;
use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;

use smartstring::alias::String as SmartString;

use xmlio_validation::{validate_cdata, validate_name, validate_ncname, Error as ValidationError};

macro_rules! xml_string_type {
	(
		$(#[$outer:meta])*
		pub struct $name:ident use $check:ident;
	) => {
		$(#[$outer])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
		#[repr(transparent)]
		pub struct $name(SmartString);

		impl $name {
			/// Extract the inner string and return it.
			pub fn into_inner(self) -> SmartString {
				self.0
			}

			/// Obtain a reference to the inner string slice.
			pub fn as_str(&self) -> &str {
				self.0.as_str()
			}

			/// Wrap a string which has already been validated.
			pub(crate) fn from_validated<T: Into<SmartString>>(s: T) -> Self {
				let s = s.into();
				debug_assert!($check(&s).is_ok());
				Self(s)
			}
		}

		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				self.0.as_str()
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.0.as_str()
			}
		}

		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				self.0.as_str()
			}
		}

		impl fmt::Display for $name {
			fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
				f.write_str(self.0.as_str())
			}
		}

		impl PartialEq<str> for $name {
			fn eq(&self, other: &str) -> bool {
				self.0.as_str() == other
			}
		}

		impl PartialEq<&str> for $name {
			fn eq(&self, other: &&str) -> bool {
				self.0.as_str() == *other
			}
		}

		impl PartialEq<$name> for str {
			fn eq(&self, other: &$name) -> bool {
				self == other.0.as_str()
			}
		}

		impl PartialEq<$name> for &str {
			fn eq(&self, other: &$name) -> bool {
				*self == other.0.as_str()
			}
		}

		impl TryFrom<&str> for $name {
			type Error = ValidationError;

			fn try_from(other: &str) -> Result<Self, Self::Error> {
				$check(other)?;
				Ok(Self(other.into()))
			}
		}

		impl TryFrom<String> for $name {
			type Error = ValidationError;

			fn try_from(other: String) -> Result<Self, Self::Error> {
				$check(&other)?;
				Ok(Self(other.into()))
			}
		}

		impl TryFrom<SmartString> for $name {
			type Error = ValidationError;

			fn try_from(other: SmartString) -> Result<Self, Self::Error> {
				$check(&other)?;
				Ok(Self(other))
			}
		}

		impl From<$name> for String {
			fn from(other: $name) -> String {
				other.0.into()
			}
		}
	}
}

xml_string_type!{
	/// String which conforms to the Name production of XML 1.0.
	pub struct Name use validate_name;
}

xml_string_type!{
	/// String which conforms to the NCName production of Namespaces in XML
	/// 1.0.
	pub struct NCName use validate_ncname;
}

xml_string_type!{
	/// String which consists only of XML 1.0 Chars.
	pub struct CData use validate_cdata;
}

impl Default for CData {
	fn default() -> Self {
		Self(SmartString::new())
	}
}

impl Name {
	/// Split the name at its colon into an optional prefix and a local
	/// name.
	///
	/// Fails with [`ValidationError::InvalidChar`] if there is more than one
	/// colon and with [`ValidationError::EmptyName`] if either side of the
	/// colon is empty.
	pub fn split_name(&self) -> Result<(Option<NCName>, NCName), ValidationError> {
		let mut parts = self.0.splitn(2, ':');
		let first = parts.next().unwrap_or("");
		match parts.next() {
			None => Ok((None, NCName(self.0.clone()))),
			Some(local) => {
				if first.is_empty() || local.is_empty() {
					return Err(ValidationError::EmptyName)
				}
				if local.contains(':') {
					return Err(ValidationError::InvalidChar(':'))
				}
				// the remaining name chars were checked as part of the Name
				let local = NCName::try_from(local)?;
				Ok((Some(NCName(first.into())), local))
			}
		}
	}
}

impl NCName {
	/// Join a prefix and this local name into a [`Name`].
	pub fn with_prefix(&self, prefix: Option<&NCName>) -> Name {
		match prefix {
			None => Name(self.0.clone()),
			Some(prefix) => {
				let mut s = SmartString::new();
				s.push_str(prefix);
				s.push(':');
				s.push_str(self);
				Name(s)
			}
		}
	}
}

impl From<NCName> for Name {
	fn from(other: NCName) -> Name {
		Name(other.0)
	}
}

impl From<NCName> for CData {
	fn from(other: NCName) -> CData {
		CData(other.0)
	}
}

impl From<Name> for CData {
	fn from(other: Name) -> CData {
		CData(other.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn split_name_without_prefix() {
		let name = Name::try_from("foo").unwrap();
		let (prefix, local) = name.split_name().unwrap();
		assert!(prefix.is_none());
		assert_eq!(local, "foo");
	}

	#[test]
	fn split_name_with_prefix() {
		let name = Name::try_from("stream:features").unwrap();
		let (prefix, local) = name.split_name().unwrap();
		assert_eq!(prefix.unwrap(), "stream");
		assert_eq!(local, "features");
	}

	#[test]
	fn split_name_rejects_multiple_colons() {
		let name = Name::try_from("a:b:c").unwrap();
		assert_eq!(name.split_name(), Err(ValidationError::InvalidChar(':')));
	}

	#[test]
	fn split_name_rejects_empty_parts() {
		assert_eq!(Name::try_from(":b").unwrap().split_name(), Err(ValidationError::EmptyName));
		assert_eq!(Name::try_from("a:").unwrap().split_name(), Err(ValidationError::EmptyName));
	}

	#[test]
	fn split_name_validates_local_start_char() {
		assert!(Name::try_from("a:1b").unwrap().split_name().is_err());
	}

	#[test]
	fn with_prefix_joins() {
		let local = NCName::try_from("item").unwrap();
		let prefix = NCName::try_from("ns0").unwrap();
		assert_eq!(local.with_prefix(Some(&prefix)), "ns0:item");
		assert_eq!(local.with_prefix(None), "item");
	}

	#[test]
	fn cdata_rejects_nonchars() {
		assert!(CData::try_from("foo\x00").is_err());
		assert!(CData::try_from(String::from("fnord")).is_ok());
	}

	#[test]
	fn widening_conversions() {
		let ncname = NCName::try_from("x").unwrap();
		let name: Name = ncname.clone().into();
		let cdata: CData = name.into();
		assert_eq!(cdata, "x");
		assert_eq!("x", ncname);
	}
}
