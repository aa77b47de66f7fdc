/*!
# Codepoint classes used by XML 1.0

The tables in this module follow the productions of the XML 1.0 (Fifth
Edition) recommendation. They are sorted and non-overlapping, which allows
lookups by binary search.
*/
use std::cmp::Ordering;
use std::fmt;

/**
# Predicate trait for matching chars
*/
pub trait CharSelector {
	/// Return true if the given char is selected by the selector
	fn select(&self, c: char) -> bool;
}

impl CharSelector for char {
	fn select(&self, c: char) -> bool {
		*self == c
	}
}

impl CharSelector for &'_ [char] {
	fn select(&self, c: char) -> bool {
		self.contains(&c)
	}
}

/// An inclusive range of codepoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodepointRange(pub char, pub char);

impl CodepointRange {
	pub fn contains(&self, c: char) -> bool {
		self.0 <= c && c <= self.1
	}

	fn compare(&self, c: char) -> Ordering {
		if c < self.0 {
			Ordering::Greater
		} else if c > self.1 {
			Ordering::Less
		} else {
			Ordering::Equal
		}
	}
}

impl CharSelector for CodepointRange {
	fn select(&self, c: char) -> bool {
		self.contains(c)
	}
}

/// A sorted table of disjoint codepoint ranges.
#[derive(Clone, Copy)]
pub struct CharClass {
	name: &'static str,
	ranges: &'static [CodepointRange],
}

impl CharClass {
	pub const fn new(name: &'static str, ranges: &'static [CodepointRange]) -> Self {
		Self{name, ranges}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn ranges(&self) -> &'static [CodepointRange] {
		self.ranges
	}
}

impl CharSelector for CharClass {
	fn select(&self, c: char) -> bool {
		// the ascii fast path covers the vast majority of real-world markup
		if (c as u32) < 0x80 {
			return self.ranges.iter().take_while(|r| r.0 <= c).any(|r| r.contains(c));
		}
		self.ranges.binary_search_by(|r| r.compare(c)).is_ok()
	}
}

impl fmt::Debug for CharClass {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "CharClass({}, <{} ranges>)", self.name, self.ranges.len())
	}
}

impl PartialEq for CharClass {
	fn eq(&self, other: &CharClass) -> bool {
		std::ptr::eq(self.ranges, other.ranges)
	}
}

/// Codepoints allowed in XML documents (XML 1.0 § 2.2 \[2\])
pub const VALID_XML_CDATA_RANGES: &'static [CodepointRange] = &[
	CodepointRange('\x09', '\x0a'),
	CodepointRange('\x0d', '\x0d'),
	CodepointRange('\u{0020}', '\u{d7ff}'),
	CodepointRange('\u{e000}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{10ffff}'),
];

// XML 1.0 § 2.3 [4]
const VALID_XML_NAME_START_RANGES: &'static [CodepointRange] = &[
	CodepointRange(':', ':'),
	CodepointRange('A', 'Z'),
	CodepointRange('_', '_'),
	CodepointRange('a', 'z'),
	CodepointRange('\u{c0}', '\u{d6}'),
	CodepointRange('\u{d8}', '\u{f6}'),
	CodepointRange('\u{f8}', '\u{2ff}'),
	CodepointRange('\u{370}', '\u{37d}'),
	CodepointRange('\u{37f}', '\u{1fff}'),
	CodepointRange('\u{200c}', '\u{200d}'),
	CodepointRange('\u{2070}', '\u{218f}'),
	CodepointRange('\u{2c00}', '\u{2fef}'),
	CodepointRange('\u{3001}', '\u{d7ff}'),
	CodepointRange('\u{f900}', '\u{fdcf}'),
	CodepointRange('\u{fdf0}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{effff}'),
];

// XML 1.0 § 2.3 [4a]
const VALID_XML_NAME_RANGES: &'static [CodepointRange] = &[
	CodepointRange('-', '.'),
	CodepointRange('0', ':'),
	CodepointRange('A', 'Z'),
	CodepointRange('_', '_'),
	CodepointRange('a', 'z'),
	CodepointRange('\u{b7}', '\u{b7}'),
	CodepointRange('\u{c0}', '\u{d6}'),
	CodepointRange('\u{d8}', '\u{f6}'),
	CodepointRange('\u{f8}', '\u{37d}'),
	CodepointRange('\u{37f}', '\u{1fff}'),
	CodepointRange('\u{200c}', '\u{200d}'),
	CodepointRange('\u{203f}', '\u{2040}'),
	CodepointRange('\u{2070}', '\u{218f}'),
	CodepointRange('\u{2c00}', '\u{2fef}'),
	CodepointRange('\u{3001}', '\u{d7ff}'),
	CodepointRange('\u{f900}', '\u{fdcf}'),
	CodepointRange('\u{fdf0}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{effff}'),
];

/// Characters allowed anywhere in a document (`Char`)
pub static CLASS_XML_CHAR: CharClass = CharClass::new("Char", VALID_XML_CDATA_RANGES);

/// Valid first characters for an XML Name (`NameStartChar`)
pub static CLASS_XML_NAMESTART: CharClass = CharClass::new("NameStartChar", VALID_XML_NAME_START_RANGES);

/// Valid non-first characters for an XML Name (`NameChar`)
pub static CLASS_XML_NAME: CharClass = CharClass::new("NameChar", VALID_XML_NAME_RANGES);

/// XML whitespace (`S`)
pub static CLASS_XML_SPACES: &'static [char] = &[' ', '\t', '\r', '\n'];

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_sorted(class: &CharClass) {
		for pair in class.ranges().windows(2) {
			assert!(pair[0].0 <= pair[0].1, "{:?}: inverted range {:?}", class, pair[0]);
			assert!(pair[0].1 < pair[1].0, "{:?}: {:?} overlaps or precedes {:?}", class, pair[0], pair[1]);
		}
	}

	#[test]
	fn tables_are_sorted_and_disjoint() {
		assert_sorted(&CLASS_XML_CHAR);
		assert_sorted(&CLASS_XML_NAMESTART);
		assert_sorted(&CLASS_XML_NAME);
	}

	#[test]
	fn binary_search_agrees_with_linear_scan() {
		for class in &[&CLASS_XML_CHAR, &CLASS_XML_NAMESTART, &CLASS_XML_NAME] {
			for cp in (0u32..0x3100).chain(0xfd00..0x10100) {
				if let Some(ch) = std::char::from_u32(cp) {
					let linear = class.ranges().iter().any(|r| r.contains(ch));
					if class.select(ch) != linear {
						panic!("{:?} disagrees with itself about U+{:04x}", class, cp);
					}
				}
			}
		}
	}

	#[test]
	fn name_start_is_subset_of_name() {
		for cp in 0u32..0x11000 {
			if let Some(ch) = std::char::from_u32(cp) {
				if CLASS_XML_NAMESTART.select(ch) && !CLASS_XML_NAME.select(ch) {
					panic!("U+{:04x} is a NameStartChar but not a NameChar", cp);
				}
			}
		}
	}

	#[test]
	fn char_class_excludes_controls() {
		assert!(!CLASS_XML_CHAR.select('\x00'));
		assert!(!CLASS_XML_CHAR.select('\x0b'));
		assert!(!CLASS_XML_CHAR.select('\u{fffe}'));
		assert!(CLASS_XML_CHAR.select('\t'));
		assert!(CLASS_XML_CHAR.select('\u{10ffff}'));
	}
}
