/*!
Byte classes for the lexer's fast paths.

The classes operate on UTF-8 code units. Multi-byte sequences are accepted
wholesale here and validated once the token is complete.
*/

pub trait ByteSelect {
	fn select(&self, b: u8) -> bool;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ByteRange(pub u8, pub u8);

impl ByteSelect for ByteRange {
	fn select(&self, b: u8) -> bool {
		self.0 <= b && b <= self.1
	}
}

impl ByteSelect for u8 {
	fn select(&self, b: u8) -> bool {
		b == *self
	}
}

impl ByteSelect for &'_ [ByteRange] {
	fn select(&self, b: u8) -> bool {
		self.iter().any(|r| r.select(b))
	}
}

/// Bytes which may start a Name
pub static CLASS_XML_NAMESTART_BYTE: &'static [ByteRange] = &[
	ByteRange(b':', b':'),
	ByteRange(b'A', b'Z'),
	ByteRange(b'_', b'_'),
	ByteRange(b'a', b'z'),
	// lead bytes of multi-byte sequences; the char is checked later
	ByteRange(b'\xc3', b'\xf7'),
];

/// Bytes which may continue a Name
pub static CLASS_XML_NAME_BYTE: &'static [ByteRange] = &[
	ByteRange(b'-', b'.'),
	ByteRange(b'0', b':'),
	ByteRange(b'A', b'Z'),
	ByteRange(b'_', b'_'),
	ByteRange(b'a', b'z'),
	ByteRange(b'\x80', b'\xff'),
];

/// XML whitespace
pub static CLASS_XML_SPACE_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\t', b'\n'),
	ByteRange(b'\r', b'\r'),
	ByteRange(b' ', b' '),
];

/// Text content minus `\r`, `&`, `<`, `]` and the control chars
pub static CLASS_XML_TEXT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\t', b'\n'),
	ByteRange(b'\x20', b'\x25'),
	ByteRange(b'\x27', b'\x3b'),
	ByteRange(b'\x3d', b'\x5c'),
	ByteRange(b'\x5e', b'\xff'),
];

/// CDATA section content minus `\r` and `]`
pub static CLASS_XML_CDATA_SECTION_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\t', b'\n'),
	ByteRange(b'\x20', b'\x5c'),
	ByteRange(b'\x5e', b'\xff'),
];

/// Comment content minus `\r` and `-`
pub static CLASS_XML_COMMENT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\t', b'\n'),
	ByteRange(b'\x20', b'\x2c'),
	ByteRange(b'\x2e', b'\xff'),
];

/// Processing instruction content minus `\r` and `?`
pub static CLASS_XML_PI_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\t', b'\n'),
	ByteRange(b'\x20', b'\x3e'),
	ByteRange(b'\x40', b'\xff'),
];

/// Attribute value content in `'` quotes; whitespace other than the space
/// is excluded because it gets normalized
pub static CLASS_XML_ATT_APOS_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x20', b'\x25'),
	ByteRange(b'\x28', b'\x3b'),
	ByteRange(b'\x3d', b'\xff'),
];

/// Attribute value content in `"` quotes
pub static CLASS_XML_ATT_QUOT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x20', b'\x21'),
	ByteRange(b'\x23', b'\x25'),
	ByteRange(b'\x27', b'\x3b'),
	ByteRange(b'\x3d', b'\xff'),
];

pub static CLASS_XML_DECIMAL_DIGIT_BYTE: ByteRange = ByteRange(b'0', b'9');

pub static CLASS_XML_HEXADECIMAL_DIGIT_BYTE: &'static [ByteRange] = &[
	ByteRange(b'0', b'9'),
	ByteRange(b'A', b'F'),
	ByteRange(b'a', b'f'),
];

#[cfg(test)]
mod tests {
	use super::*;

	use xmlio_validation::selectors::{CharSelector, CLASS_XML_NAME, CLASS_XML_NAMESTART};

	#[test]
	fn ascii_name_bytes_match_char_classes() {
		for b in 0u8..0x80 {
			let ch = b as char;
			assert_eq!(CLASS_XML_NAMESTART_BYTE.select(b), CLASS_XML_NAMESTART.select(ch), "namestart {:?}", ch);
			assert_eq!(CLASS_XML_NAME_BYTE.select(b), CLASS_XML_NAME.select(ch), "name {:?}", ch);
		}
	}

	#[test]
	fn text_excludes_markup_delimiters() {
		for b in b"<&]\r\x00\x1f".iter() {
			assert!(!CLASS_XML_TEXT_DELIMITED_BYTE.select(*b));
		}
		for b in b"abc >'\"\t\n\xc3\xa4".iter() {
			assert!(CLASS_XML_TEXT_DELIMITED_BYTE.select(*b));
		}
	}

	#[test]
	fn attribute_classes_exclude_their_quote() {
		assert!(!CLASS_XML_ATT_QUOT_DELIMITED_BYTE.select(b'"'));
		assert!(CLASS_XML_ATT_QUOT_DELIMITED_BYTE.select(b'\''));
		assert!(!CLASS_XML_ATT_APOS_DELIMITED_BYTE.select(b'\''));
		assert!(CLASS_XML_ATT_APOS_DELIMITED_BYTE.select(b'"'));
		for b in b"<&\t\n\r".iter() {
			assert!(!CLASS_XML_ATT_QUOT_DELIMITED_BYTE.select(*b));
			assert!(!CLASS_XML_ATT_APOS_DELIMITED_BYTE.select(*b));
		}
	}
}
