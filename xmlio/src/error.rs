/*!
# Error types

This module holds the error types returned by the various functions of this
crate.

All errors are fatal for the instance which produced them: tokenizers,
writers and fragment readers remember the first error they encountered and
return a clone of it from every later call.
*/
use std::error;
use std::fmt;
use std::io;
use std::ops::Deref;
use std::result::Result as StdResult;
use std::sync::Arc;

use xmlio_validation::Error as ValidationError;

pub const ERRCTX_UNKNOWN: &'static str = "in unknown context";
pub const ERRCTX_TEXT: &'static str = "in text node";
pub const ERRCTX_ATTVAL: &'static str = "in attribute value";
pub const ERRCTX_NAME: &'static str = "in name";
pub const ERRCTX_ELEMENT: &'static str = "in element header";
pub const ERRCTX_ELEMENT_FOOT: &'static str = "in element footer";
pub const ERRCTX_XML_DECL: &'static str = "in XML declaration";
pub const ERRCTX_REF: &'static str = "in entity or character reference";
pub const ERRCTX_CDATA_SECTION: &'static str = "in CDATA section";
pub const ERRCTX_COMMENT: &'static str = "in comment";
pub const ERRCTX_PI: &'static str = "in processing instruction";
pub const ERRCTX_DOCTYPE: &'static str = "in document type declaration";
pub const ERRCTX_DOCBEGIN: &'static str = "before document element";
pub const ERRCTX_DOCEND: &'static str = "after document element";

/// Location in the (decoded) input stream.
///
/// Lines and columns are 1-based; columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
	pub offset: usize,
	pub line: usize,
	pub column: usize,
}

impl Position {
	/// The position of the first character of a stream.
	pub const START: Position = Position{offset: 0, line: 1, column: 1};

	pub(crate) fn advance(&mut self, bytes: &[u8]) {
		self.offset += bytes.len();
		for b in bytes {
			if *b == b'\n' {
				self.line += 1;
				self.column = 1;
			} else if *b & 0xc0 != 0x80 {
				// utf-8 continuation bytes do not start a new character
				self.column += 1;
			}
		}
	}
}

impl Default for Position {
	fn default() -> Self {
		Self::START
	}
}

impl fmt::Display for Position {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "line {}, column {}", self.line, self.column)
	}
}

fn write_alternatives(f: &mut fmt::Formatter, opts: &[&str]) -> fmt::Result {
	f.write_str(" (expected ")?;
	if opts.len() == 1 {
		f.write_str(opts[0])?;
	} else {
		f.write_str("one of: ")?;
		for (i, opt) in opts.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			f.write_str(opt)?;
		}
	}
	f.write_str(")")
}

/// Violation of a well-formedness constraint or the XML 1.0 grammar.
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum WFError {
	/// End-of-file encountered during a construct where more data was
	/// expected.
	InvalidEof(&'static str),

	/// Attempt to refer to an undeclared entity.
	UndeclaredEntity,

	/// Unicode codepoint which is not allowed in XML 1.0 encountered.
	///
	/// The flag is true if the codepoint was produced by a character
	/// reference.
	InvalidChar(&'static str, u32, bool),

	/// Unicode codepoint which was not expected at that point in the
	/// grammar.
	UnexpectedChar(&'static str, char, Option<&'static [&'static str]>),

	/// Byte which was not expected at that point in the grammar.
	UnexpectedByte(&'static str, u8, Option<&'static [&'static str]>),

	/// Generalized invalid syntactic construct which does not fit into any
	/// of the other categories.
	InvalidSyntax(&'static str),

	/// Token was not expected by the parser at that point in the grammar.
	UnexpectedToken(&'static str, &'static str, Option<&'static [&'static str]>),

	/// Attribute was declared multiple times in the same element.
	///
	/// This is also reported for namespaced attributes which resolve to the
	/// same `(uri, localname)` pair.
	DuplicateAttribute,

	/// Ending tag name does not match opening tag.
	ElementMismatch,
}

impl error::Error for WFError {}

impl fmt::Display for WFError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::InvalidEof(ctx) => write!(f, "invalid eof {}", ctx),
			Self::UndeclaredEntity => f.write_str("use of undeclared entity"),
			Self::InvalidChar(ctx, cp, false) => write!(f, "invalid codepoint U+{:x} {}", cp, ctx),
			Self::InvalidChar(ctx, cp, true) => write!(
				f,
				"character reference expanded to invalid codepoint U+{:x} {}",
				cp, ctx
			),
			Self::UnexpectedChar(ctx, ch, opts) => {
				write!(f, "U+{:x} not allowed {}", *ch as u32, ctx)?;
				match opts {
					Some(opts) if opts.len() > 0 => write_alternatives(f, opts),
					_ => Ok(()),
				}
			}
			Self::UnexpectedByte(ctx, b, opts) => {
				write!(f, "0x{:x} not allowed {}", *b, ctx)?;
				match opts {
					Some(opts) if opts.len() > 0 => write_alternatives(f, opts),
					_ => Ok(()),
				}
			}
			Self::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
			Self::UnexpectedToken(ctx, tok, opts) => {
				write!(f, "unexpected {} token {}", tok, ctx)?;
				match opts {
					Some(opts) if opts.len() > 0 => write_alternatives(f, opts),
					_ => Ok(()),
				}
			}
			Self::DuplicateAttribute => f.write_str("duplicate attribute"),
			Self::ElementMismatch => f.write_str("start and end tag do not match"),
		}
	}
}

/// Violation of a namespace-well-formedness constraint or the Namespaces
/// in XML 1.0 grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum NWFError {
	/// More than one colon encountered in a name.
	MultiColonName(&'static str),

	/// One side of the colon in a name was empty.
	EmptyNamePart(&'static str),

	/// Use of an undeclared namespace prefix.
	UndeclaredNamespacePrefix(&'static str),

	/// Attempt to redefine a reserved namespace prefix or to bind a reserved
	/// namespace name to another prefix.
	ReservedNamespacePrefix,

	/// Local name does not conform to the NCName production.
	InvalidLocalName(&'static str),

	/// A prefixed namespace declaration used an empty URI.
	EmptyNamespaceUri,
}

impl error::Error for NWFError {}

impl fmt::Display for NWFError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::MultiColonName(ctx) => write!(f, "more than one colon {}", ctx),
			Self::EmptyNamePart(ctx) => write!(f, "empty string on one side of the colon {}", ctx),
			Self::UndeclaredNamespacePrefix(ctx) => write!(f, "use of undeclared namespace prefix {}", ctx),
			Self::ReservedNamespacePrefix => f.write_str("reserved namespace prefix"),
			Self::InvalidLocalName(ctx) => write!(f, "local name is invalid {}", ctx),
			Self::EmptyNamespaceUri => f.write_str("namespace URI is empty"),
		}
	}
}

/// Failure to determine or apply the character encoding of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingError {
	/// The `encoding` pseudo-attribute of the XML declaration is not
	/// followed by `=`.
	MissingEquals,
	/// The value of the `encoding` pseudo-attribute is not enclosed in a
	/// matching pair of quotes.
	MissingQuote,
	/// The XML declaration did not end before the sniffing limit or the end
	/// of the stream.
	UnterminatedDeclaration,
	/// The encoding name is not known to the decoder.
	Unsupported(String),
	/// The input is not valid in the named encoding.
	Malformed(&'static str),
	/// Text cannot be represented in the named output encoding.
	Unmappable(&'static str),
}

impl error::Error for EncodingError {}

impl fmt::Display for EncodingError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::MissingEquals => f.write_str("missing '=' after encoding in XML declaration"),
			Self::MissingQuote => f.write_str("encoding value in XML declaration is not properly quoted"),
			Self::UnterminatedDeclaration => f.write_str("unterminated XML declaration"),
			Self::Unsupported(name) => write!(f, "unsupported encoding {:?}", name),
			Self::Malformed(name) => write!(f, "malformed {} input", name),
			Self::Unmappable(name) => write!(f, "text cannot be encoded as {}", name),
		}
	}
}

/// Violation of the calling contract of a reader or writer.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureError {
	/// The reader produced a different kind of event than required.
	UnexpectedEvent {
		expected: &'static str,
		actual: &'static str,
	},
	/// An end tag does not match the innermost open start tag.
	///
	/// Both names are given in `{uri}local` notation.
	EndTagMismatch {
		expected: String,
		actual: String,
	},
	/// An element name was expected to match a given one.
	ElementMismatch {
		expected: String,
		actual: String,
	},
	/// An end tag was written without any open element.
	NoOpenElement,
	/// A namespace was used without being declared while namespace repair
	/// is disabled.
	UndeclaredNamespace(String),
	/// A reserved prefix or namespace name was bound incorrectly.
	ReservedNamespace(String),
	/// A name or text value did not pass validation.
	InvalidValue(&'static str, ValidationError),
	/// Content which cannot be represented in the given construct, like `--`
	/// inside a comment.
	InvalidContent(&'static str),
	/// The call is not allowed in the current writer state.
	InvalidState(&'static str),
}

impl error::Error for StructureError {}

impl fmt::Display for StructureError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::UnexpectedEvent{expected, actual} => write!(f, "expected {}, found {}", expected, actual),
			Self::EndTagMismatch{expected, actual} => write!(f, "end tag {} does not match open element {}", actual, expected),
			Self::ElementMismatch{expected, actual} => write!(f, "expected element {}, found {}", expected, actual),
			Self::NoOpenElement => f.write_str("end tag without open element"),
			Self::UndeclaredNamespace(uri) => write!(f, "namespace {:?} is not declared", uri),
			Self::ReservedNamespace(what) => write!(f, "invalid use of reserved namespace binding {}", what),
			Self::InvalidValue(what, err) => write!(f, "invalid {}: {}", what, err),
			Self::InvalidContent(msg) => f.write_str(msg),
			Self::InvalidState(msg) => f.write_str(msg),
		}
	}
}

/// [`std::sync::Arc`]-based wrapper around [`std::io::Error`] to allow
/// cloning.
#[derive(Clone)]
pub struct IOErrorWrapper(Arc<io::Error>);

impl IOErrorWrapper {
	fn wrap(e: io::Error) -> IOErrorWrapper {
		IOErrorWrapper(Arc::new(e))
	}
}

impl fmt::Debug for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(&**self, f)
	}
}

impl fmt::Display for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Display::fmt(&**self, f)
	}
}

impl PartialEq for IOErrorWrapper {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Deref for IOErrorWrapper {
	type Target = io::Error;

	fn deref(&self) -> &io::Error {
		&*self.0
	}
}

/// Error types which may be returned by readers and writers.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
	/// The underlying source or sink failed.
	///
	/// The position is known if the error was raised while tokenizing.
	///
	/// **Note:** An unexpected end of file inside markup is signalled using
	/// [`Error::NotWellFormed`], not an I/O error.
	IO(IOErrorWrapper, Option<Position>),
	/// The document encoding could not be determined or applied.
	Encoding(EncodingError),
	/// A violation of the XML 1.0 grammar or a well-formedness constraint.
	NotWellFormed(WFError, Position),
	/// A violation of the Namespaces in XML 1.0 grammar or a
	/// namespace-well-formedness constraint.
	NotNamespaceWellFormed(NWFError, Position),
	/// A configured limit was exceeded.
	///
	/// The string indicates the context and should not be interpreted by
	/// user code.
	RestrictedXml(&'static str, Position),
	/// The caller violated the contract of a reader or writer.
	Structure(StructureError),
}

pub type Result<T> = StdResult<T, Error>;

impl Error {
	/// Wrap an I/O error.
	///
	/// Decoding failures travel through [`std::io::BufRead`] as I/O errors
	/// carrying an [`EncodingError`]; those are unwrapped again here.
	pub fn io(e: io::Error) -> Error {
		if let Some(inner) = e.get_ref().and_then(|inner| inner.downcast_ref::<EncodingError>()) {
			return Error::Encoding(inner.clone())
		}
		Error::IO(IOErrorWrapper::wrap(e), None)
	}

	/// Return the location in the input at which the error was detected,
	/// if known.
	pub fn location(&self) -> Option<Position> {
		match self {
			Self::IO(_, pos) => *pos,
			Self::NotWellFormed(_, pos) | Self::NotNamespaceWellFormed(_, pos) | Self::RestrictedXml(_, pos) => Some(*pos),
			Self::Encoding(_) | Self::Structure(_) => None,
		}
	}

	/// True for the errors classified as syntax errors: the input was not
	/// (namespace-)well-formed or exceeded a limit.
	pub fn is_syntax_error(&self) -> bool {
		matches!(self, Self::NotWellFormed(..) | Self::NotNamespaceWellFormed(..) | Self::RestrictedXml(..))
	}

	pub(crate) fn wf(e: WFError, pos: Position) -> Error {
		Error::NotWellFormed(e, pos)
	}

	pub(crate) fn nwf(e: NWFError, pos: Position) -> Error {
		Error::NotNamespaceWellFormed(e, pos)
	}

	pub(crate) fn wfeof(ctx: &'static str, pos: Position) -> Error {
		Error::NotWellFormed(WFError::InvalidEof(ctx), pos)
	}

	pub(crate) fn invalid(what: &'static str, e: ValidationError) -> Error {
		Error::Structure(StructureError::InvalidValue(what, e))
	}

	pub(crate) fn state(msg: &'static str) -> Error {
		Error::Structure(StructureError::InvalidState(msg))
	}

	pub(crate) fn at(self, pos: Position) -> Error {
		match self {
			Self::IO(e, None) => Self::IO(e, Some(pos)),
			other => other,
		}
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			Self::IO(e, _) => Some(&**e),
			Self::Encoding(e) => Some(e),
			Self::NotWellFormed(e, _) => Some(e),
			Self::NotNamespaceWellFormed(e, _) => Some(e),
			Self::RestrictedXml(..) => None,
			Self::Structure(e) => Some(e),
		}
	}
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::IO(e, Some(pos)) => write!(f, "I/O error at {}: {}", pos, e),
			Self::IO(e, None) => write!(f, "I/O error: {}", e),
			Self::Encoding(e) => write!(f, "encoding error: {}", e),
			Self::NotWellFormed(e, pos) => write!(f, "not-well-formed at {}: {}", pos, e),
			Self::NotNamespaceWellFormed(e, pos) => write!(f, "not namespace-well-formed at {}: {}", pos, e),
			Self::RestrictedXml(msg, pos) => write!(f, "restricted xml at {}: {}", pos, msg),
			Self::Structure(e) => write!(f, "structure error: {}", e),
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::io(e)
	}
}

impl From<EncodingError> for Error {
	fn from(e: EncodingError) -> Error {
		Error::Encoding(e)
	}
}

impl From<StructureError> for Error {
	fn from(e: StructureError) -> Error {
		Error::Structure(e)
	}
}

impl From<Error> for io::Error {
	fn from(e: Error) -> io::Error {
		match e {
			Error::IO(e, _) => io::Error::new(e.kind(), e.to_string()),
			Error::Encoding(e) => io::Error::new(io::ErrorKind::InvalidData, e),
			other => io::Error::new(io::ErrorKind::InvalidData, other),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn position_counts_characters_not_bytes() {
		let mut pos = Position::START;
		pos.advance("ä€x".as_bytes());
		assert_eq!(pos.offset, 6);
		assert_eq!(pos.line, 1);
		assert_eq!(pos.column, 4);
		pos.advance(b"\nab");
		assert_eq!(pos.line, 2);
		assert_eq!(pos.column, 3);
	}

	#[test]
	fn io_errors_pick_up_location_once() {
		let err = Error::io(io::Error::new(io::ErrorKind::Other, "boom"));
		assert_eq!(err.location(), None);
		let at = Position{offset: 3, line: 1, column: 4};
		let err = err.at(at);
		assert_eq!(err.location(), Some(at));
		let later = Position{offset: 10, line: 2, column: 1};
		assert_eq!(err.clone().at(later).location(), Some(at));
	}

	#[test]
	fn encoding_errors_survive_io_roundtrip() {
		let e = io::Error::new(io::ErrorKind::InvalidData, EncodingError::Malformed("UTF-16LE"));
		assert_eq!(Error::io(e), Error::Encoding(EncodingError::Malformed("UTF-16LE")));
	}

	#[test]
	fn display_lists_alternatives() {
		let e = WFError::UnexpectedChar(ERRCTX_ELEMENT, '!', Some(&["'>'", "'/>'"]));
		assert_eq!(e.to_string(), "U+21 not allowed in element header (expected one of: '>', '/>')");
		let e = WFError::UnexpectedToken(ERRCTX_TEXT, "Eq", Some(&["Text"]));
		assert_eq!(e.to_string(), "unexpected Eq token in text node (expected Text)");
	}

	#[test]
	fn structure_errors_report_expected_and_actual() {
		let e: Error = StructureError::EndTagMismatch{
			expected: "{urn:a}x".to_string(),
			actual: "{urn:a}y".to_string(),
		}.into();
		let msg = e.to_string();
		assert!(msg.contains("{urn:a}x"));
		assert!(msg.contains("{urn:a}y"));
	}
}
