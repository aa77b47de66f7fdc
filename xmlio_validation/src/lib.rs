/*!
# Validator functions for XML-related strings

This is a supplementary crate for `xmlio`. It holds the character class
tables of XML 1.0 and the functions which check strings against the `Name`,
`NCName` and `Char*` productions. The parser uses the tables directly; the
string types and the writer use the validator functions.
*/
use std::fmt;

pub mod selectors;

use selectors::CharSelector;

/**
Error condition from validating an XML string.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// A Name or NCName was empty.
	EmptyName,
	/// An invalid character was encountered.
	///
	/// This variant contains the character as data.
	InvalidChar(char),
	/// A processing instruction target was `xml` in some capitalization.
	ReservedPITarget,
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::EmptyName => f.write_str("Name and NCName must not be empty"),
			Self::InvalidChar(c) => write!(f, "character U+{:04x} is not allowed", *c as u32),
			Self::ReservedPITarget => f.write_str("processing instruction targets matching 'xml' are reserved"),
		}
	}
}

impl std::error::Error for Error {}

fn validate_name_chars(s: &str, allow_colon: bool) -> Result<(), Error> {
	let mut chars = s.chars();
	match chars.next() {
		None => return Err(Error::EmptyName),
		Some(c) => if !selectors::CLASS_XML_NAMESTART.select(c) || (!allow_colon && c == ':') {
			return Err(Error::InvalidChar(c))
		},
	}
	for ch in chars {
		if !selectors::CLASS_XML_NAME.select(ch) || (!allow_colon && ch == ':') {
			return Err(Error::InvalidChar(ch))
		}
	}
	Ok(())
}

/**
Check whether a str is a valid XML 1.0 Name

# Example

```rust
use xmlio_validation::{validate_name, Error};

assert!(validate_name("foobar").is_ok());
assert!(validate_name("foo:bar").is_ok());
assert!(matches!(validate_name("foo bar"), Err(Error::InvalidChar(' '))));
assert!(matches!(validate_name(""), Err(Error::EmptyName)));
```
*/
pub fn validate_name(s: &str) -> Result<(), Error> {
	validate_name_chars(s, true)
}

/**
Check whether a str is a valid XML 1.0 Name, without colons.

# Example

```rust
use xmlio_validation::{validate_ncname, Error};

assert!(validate_ncname("foobar").is_ok());
assert!(matches!(validate_ncname("foo:bar"), Err(Error::InvalidChar(':'))));
assert!(matches!(validate_ncname(""), Err(Error::EmptyName)));
```
*/
pub fn validate_ncname(s: &str) -> Result<(), Error> {
	validate_name_chars(s, false)
}

/**
Check whether a str is valid XML 1.0 character data

# Example

```rust
use xmlio_validation::{validate_cdata, Error};

assert!(validate_cdata("foo bar baz <fnord!>").is_ok());
assert!(matches!(validate_cdata("\x01"), Err(Error::InvalidChar('\x01'))));
```
*/
pub fn validate_cdata(s: &str) -> Result<(), Error> {
	match s.chars().find(|c| !selectors::CLASS_XML_CHAR.select(*c)) {
		Some(c) => Err(Error::InvalidChar(c)),
		None => Ok(()),
	}
}

/// Check whether a str may be used as processing instruction target.
pub fn validate_pi_target(s: &str) -> Result<(), Error> {
	validate_name(s)?;
	if s.eq_ignore_ascii_case("xml") {
		return Err(Error::ReservedPITarget)
	}
	Ok(())
}

/// Return true if the str consists only of XML whitespace.
///
/// The empty string counts as whitespace.
pub fn is_xml_whitespace(s: &str) -> bool {
	s.chars().all(|c| selectors::CLASS_XML_SPACES.select(c))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cdata_smoketest() {
		assert!(validate_cdata("foo bar baz http://<xyz>").is_ok());
		assert!(validate_cdata("\u{ffff}").is_err());
		assert!(validate_cdata("").is_ok());
	}

	#[test]
	fn test_name_smoketest() {
		assert!(validate_name("foobar").is_ok());
		assert!(validate_name("foo:bar").is_ok());
		assert!(validate_name("_x-1.y").is_ok());
		assert!(validate_name("").is_err());
		assert!(validate_name("1abc").is_err());
		assert!(validate_name("foo bar baz http://<xyz>").is_err());
		assert!(validate_name("\u{ffff}").is_err());
	}

	#[test]
	fn test_ncname_smoketest() {
		assert!(validate_ncname("foobar").is_ok());
		assert!(validate_ncname("foo:bar").is_err());
		assert!(validate_ncname(":foo").is_err());
		assert!(validate_ncname("").is_err());
		assert!(validate_ncname("\u{ffff}").is_err());
	}

	#[test]
	fn test_pi_target() {
		assert!(validate_pi_target("xml-stylesheet").is_ok());
		assert_eq!(validate_pi_target("XmL"), Err(Error::ReservedPITarget));
		assert_eq!(validate_pi_target(""), Err(Error::EmptyName));
	}

	#[test]
	fn test_whitespace() {
		assert!(is_xml_whitespace(" \t\r\n"));
		assert!(is_xml_whitespace(""));
		assert!(!is_xml_whitespace(" x "));
		assert!(!is_xml_whitespace("\u{a0}"));
	}
}
