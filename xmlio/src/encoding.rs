/*!
# Encoding detection and decoding

Before the lexer sees a single byte, the encoding of the input has to be
known. [`sniff`] inspects the first bytes of a stream following Appendix F
of the XML 1.0 specification: byte order marks, the shape of a leading `<`
or `<?` in wide encodings, and finally the `encoding` pseudo-attribute of
the XML declaration.

[`DecodingReader`] wraps the byte stream, replays the inspected prefix and
presents the document as UTF-8 through [`std::io::BufRead`]. UTF-8 input
passes through untouched, UTF-32 is decoded here and everything else is
handed to [`encoding_rs`].

Canonical names produced by the sniffer are `UTF-8`, `UTF-16BE`, `UTF-16LE`,
`UTF-32BE` and `UTF-32LE`. A declared name is reported as written.
*/
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::io::{BufRead, Read};

use crate::error::{EncodingError, Error, Result};

/// Longest XML declaration the sniffer reads before giving up.
const DECL_LIMIT: usize = 1024;

const CHUNK_SIZE: usize = 8192;

pub const UTF_8: &'static str = "UTF-8";
pub const UTF_16BE: &'static str = "UTF-16BE";
pub const UTF_16LE: &'static str = "UTF-16LE";
pub const UTF_32BE: &'static str = "UTF-32BE";
pub const UTF_32LE: &'static str = "UTF-32LE";

/// How the encoding of a stream was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
	/// The caller supplied the encoding.
	Explicit,
	/// A byte order mark was found.
	ByteOrderMark,
	/// The first characters are `<` or `<?` in a wide encoding.
	Pattern,
	/// The XML declaration names the encoding.
	Declaration,
	/// Nothing indicated an encoding; UTF-8 is assumed.
	Default,
}

fn is_space(b: u8) -> bool {
	b == b' ' || b == b'\t' || b == b'\r' || b == b'\n'
}

/// Extract the value of the `encoding` pseudo-attribute from the text of an
/// XML declaration.
///
/// In strict mode, the name must be followed by `=` and the quote without
/// any whitespace in between. Relaxed mode allows whitespace before and
/// after the `=`.
pub fn declared_encoding(decl: &[u8], relaxed: bool) -> std::result::Result<Option<String>, EncodingError> {
	// a pseudo-attribute name is always preceded by whitespace
	let mut i = match (1..decl.len()).find(|p| is_space(decl[p - 1]) && decl[*p..].starts_with(b"encoding")) {
		Some(p) => p + 8,
		None => return Ok(None),
	};
	let skip_space = |mut i: usize| {
		while relaxed && i < decl.len() && is_space(decl[i]) {
			i += 1;
		}
		i
	};
	i = skip_space(i);
	if decl.get(i) != Some(&b'=') {
		return Err(EncodingError::MissingEquals)
	}
	i = skip_space(i + 1);
	let quote = match decl.get(i) {
		Some(b'"') => b'"',
		Some(b'\'') => b'\'',
		_ => return Err(EncodingError::MissingQuote),
	};
	let value = &decl[i + 1..];
	let end = match value.iter().position(|b| *b == quote) {
		Some(end) => end,
		None => return Err(EncodingError::MissingQuote),
	};
	let name = String::from_utf8_lossy(&value[..end]).into_owned();
	if name.eq_ignore_ascii_case(UTF_8) {
		return Ok(Some(UTF_8.to_string()))
	}
	Ok(Some(name))
}

fn fill_to<R: Read + ?Sized>(src: &mut R, buf: &mut Vec<u8>, want: usize) -> io::Result<bool> {
	let mut chunk = [0u8; 256];
	while buf.len() < want {
		let n = match src.read(&mut chunk[..(want - buf.len()).min(256)]) {
			Ok(n) => n,
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e),
		};
		if n == 0 {
			return Ok(false)
		}
		buf.extend_from_slice(&chunk[..n]);
	}
	Ok(true)
}

/// Determine the encoding from the start of `src`.
///
/// Returns the encoding name, how it was found and the bytes consumed from
/// `src`, which the caller has to replay.
pub fn sniff<R: Read + ?Sized>(src: &mut R, relaxed: bool) -> Result<(String, Detection, Vec<u8>)> {
	let mut prefix = Vec::with_capacity(64);
	if !fill_to(src, &mut prefix, 4)? {
		return Ok((UTF_8.to_string(), Detection::Default, prefix))
	}
	let word = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
	let (name, how) = match word {
		0x0000feff => (UTF_32BE, Detection::ByteOrderMark),
		0xfffe0000 => (UTF_32LE, Detection::ByteOrderMark),
		0x0000003c => (UTF_32BE, Detection::Pattern),
		0x3c000000 => (UTF_32LE, Detection::Pattern),
		0x003c003f => (UTF_16BE, Detection::Pattern),
		0x3c003f00 => (UTF_16LE, Detection::Pattern),
		0x3c3f786d => {
			// `<?xm`: an ASCII compatible encoding, maybe declared
			fill_to(src, &mut prefix, 6)?;
			// `<?xml-stylesheet` and friends are processing instructions
			if prefix.len() < 6 || prefix[4] != b'l' || !is_space(prefix[5]) {
				log::debug!("sniffed encoding {} ({:?})", UTF_8, Detection::Default);
				return Ok((UTF_8.to_string(), Detection::Default, prefix))
			}
			loop {
				if let Some(end) = prefix.iter().position(|b| *b == b'>') {
					let declared = declared_encoding(&prefix[..end + 1], relaxed)?;
					let (name, how) = match declared {
						Some(name) => (name, Detection::Declaration),
						None => (UTF_8.to_string(), Detection::Default),
					};
					log::debug!("sniffed encoding {} ({:?})", name, how);
					return Ok((name, how, prefix))
				}
				if prefix.len() >= DECL_LIMIT {
					return Err(EncodingError::UnterminatedDeclaration.into())
				}
				let want = (prefix.len() + 64).min(DECL_LIMIT);
				if !fill_to(src, &mut prefix, want)? && !prefix.contains(&b'>') {
					return Err(EncodingError::UnterminatedDeclaration.into())
				}
			}
		},
		w if w & 0xffff0000 == 0xfeff0000 => (UTF_16BE, Detection::ByteOrderMark),
		w if w & 0xffff0000 == 0xfffe0000 => (UTF_16LE, Detection::ByteOrderMark),
		w if w & 0xffffff00 == 0xefbbbf00 => (UTF_8, Detection::ByteOrderMark),
		_ => (UTF_8, Detection::Default),
	};
	log::debug!("sniffed encoding {} ({:?})", name, how);
	Ok((name.to_string(), how, prefix))
}

enum Kind {
	Utf8,
	Utf32{big_endian: bool},
	Other(encoding_rs::Decoder),
}

impl Kind {
	fn for_name(name: &str) -> std::result::Result<Kind, EncodingError> {
		if name.eq_ignore_ascii_case(UTF_32BE) || name.eq_ignore_ascii_case("UTF-32") {
			return Ok(Kind::Utf32{big_endian: true})
		}
		if name.eq_ignore_ascii_case(UTF_32LE) {
			return Ok(Kind::Utf32{big_endian: false})
		}
		match encoding_rs::Encoding::for_label(name.as_bytes()) {
			Some(enc) if enc == encoding_rs::UTF_8 => Ok(Kind::Utf8),
			Some(enc) => Ok(Kind::Other(enc.new_decoder_with_bom_removal())),
			None => Err(EncodingError::Unsupported(name.to_string())),
		}
	}
}

/**
# UTF-8 view of a document in any supported encoding

```
use std::io::Read;
use xmlio::encoding::DecodingReader;

let doc = b"\xff\xfe<\x00a\x00/\x00>\x00";
let mut r = DecodingReader::sniff(&doc[..], None, false).unwrap();
assert_eq!(r.encoding(), "UTF-16LE");
let mut text = String::new();
r.read_to_string(&mut text).unwrap();
assert_eq!(text, "<a/>");
```

Decoding errors are reported as [`std::io::Error`]s wrapping an
[`EncodingError`]; the tokenizer unwraps them again.
*/
pub struct DecodingReader<R> {
	src: io::Chain<io::Cursor<Vec<u8>>, R>,
	name: String,
	detection: Detection,
	kind: Kind,
	raw: Vec<u8>,
	out: Vec<u8>,
	out_pos: usize,
	at_start: bool,
	eof: bool,
}

impl<R: Read> DecodingReader<R> {
	/// Wrap `src`, decoding from `encoding` if given and from the sniffed
	/// encoding otherwise.
	pub fn sniff(mut src: R, encoding: Option<&str>, relaxed: bool) -> Result<Self> {
		let (name, detection, prefix) = match encoding {
			Some(name) => (name.to_string(), Detection::Explicit, Vec::new()),
			None => sniff(&mut src, relaxed)?,
		};
		Self::with_prefix(src, prefix, name, detection)
	}

	/// Wrap `src`, decoding from the named encoding.
	pub fn new(src: R, encoding: &str) -> Result<Self> {
		Self::with_prefix(src, Vec::new(), encoding.to_string(), Detection::Explicit)
	}

	fn with_prefix(src: R, prefix: Vec<u8>, name: String, detection: Detection) -> Result<Self> {
		let kind = Kind::for_name(&name)?;
		Ok(Self{
			src: io::Cursor::new(prefix).chain(src),
			name,
			detection,
			kind,
			raw: Vec::new(),
			out: Vec::new(),
			out_pos: 0,
			at_start: true,
			eof: false,
		})
	}

	/// Name of the encoding the input is decoded from.
	pub fn encoding(&self) -> &str {
		&self.name
	}

	pub fn detection(&self) -> Detection {
		self.detection
	}

	/// Return the underlying reader.
	///
	/// Bytes which were read from it but not yet decoded are lost.
	pub fn into_inner(self) -> R {
		self.src.into_inner().1
	}

	fn decode_utf32(&mut self, big_endian: bool, last: bool) -> std::result::Result<(), EncodingError> {
		let name = if big_endian { UTF_32BE } else { UTF_32LE };
		let usable = self.raw.len() - self.raw.len() % 4;
		for unit in self.raw[..usable].chunks(4) {
			let cp = if big_endian {
				u32::from_be_bytes([unit[0], unit[1], unit[2], unit[3]])
			} else {
				u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])
			};
			let ch = match std::char::from_u32(cp) {
				Some(ch) => ch,
				None => return Err(EncodingError::Malformed(name)),
			};
			if self.at_start {
				self.at_start = false;
				if ch == '\u{feff}' {
					continue;
				}
			}
			let mut buf = [0u8; 4];
			self.out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
		}
		self.raw.drain(..usable);
		if last && self.raw.len() > 0 {
			return Err(EncodingError::Malformed(name))
		}
		Ok(())
	}

	fn decode(&mut self, last: bool) -> std::result::Result<(), EncodingError> {
		match &mut self.kind {
			Kind::Utf8 => {
				// validated by the lexer
				std::mem::swap(&mut self.raw, &mut self.out);
				Ok(())
			},
			Kind::Utf32{big_endian} => {
				let big_endian = *big_endian;
				self.decode_utf32(big_endian, last)
			},
			Kind::Other(decoder) => {
				let name = decoder.encoding().name();
				let needed = match decoder.max_utf8_buffer_length_without_replacement(self.raw.len()) {
					Some(n) => n,
					None => return Err(EncodingError::Malformed(name)),
				};
				self.out.resize(needed, 0);
				let (result, read, written) = decoder.decode_to_utf8_without_replacement(&self.raw, &mut self.out, last);
				self.out.truncate(written);
				self.raw.drain(..read);
				match result {
					encoding_rs::DecoderResult::Malformed(..) => Err(EncodingError::Malformed(name)),
					_ => Ok(()),
				}
			},
		}
	}

	fn refill(&mut self) -> io::Result<()> {
		self.out.clear();
		self.out_pos = 0;
		let start = self.raw.len();
		self.raw.resize(start + CHUNK_SIZE, 0);
		let n = loop {
			match self.src.read(&mut self.raw[start..]) {
				Ok(n) => break n,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					self.raw.truncate(start);
					return Err(e)
				},
			}
		};
		self.raw.truncate(start + n);
		let last = n == 0;
		self.decode(last).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
		if last {
			self.eof = true;
		}
		Ok(())
	}
}

impl<R: Read> BufRead for DecodingReader<R> {
	fn fill_buf(&mut self) -> io::Result<&[u8]> {
		while self.out_pos >= self.out.len() && !self.eof {
			self.refill()?;
		}
		Ok(&self.out[self.out_pos..])
	}

	fn consume(&mut self, amt: usize) {
		self.out_pos = (self.out_pos + amt).min(self.out.len());
	}
}

impl<R: Read> Read for DecodingReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let n = {
			let available = self.fill_buf()?;
			let n = available.len().min(buf.len());
			buf[..n].copy_from_slice(&available[..n]);
			n
		};
		self.consume(n);
		Ok(n)
	}
}

impl<R> fmt::Debug for DecodingReader<R> {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("DecodingReader")
			.field("encoding", &self.name)
			.field("detection", &self.detection)
			.field("eof", &self.eof)
			.finish()
	}
}

/// Encode text for output in the named encoding.
///
/// UTF-8 output is borrowed. Characters which the target encoding cannot
/// represent are an error; the writer never substitutes them.
pub fn encode_str<'a>(text: &'a str, encoding: &str) -> Result<Cow<'a, [u8]>> {
	if encoding.eq_ignore_ascii_case(UTF_8) || encoding.eq_ignore_ascii_case("UTF8") {
		return Ok(Cow::Borrowed(text.as_bytes()))
	}
	if encoding.eq_ignore_ascii_case(UTF_16BE) {
		return Ok(Cow::Owned(text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()))
	}
	if encoding.eq_ignore_ascii_case(UTF_16LE) || encoding.eq_ignore_ascii_case("UTF-16") {
		return Ok(Cow::Owned(text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()))
	}
	if encoding.eq_ignore_ascii_case(UTF_32BE) || encoding.eq_ignore_ascii_case("UTF-32") {
		return Ok(Cow::Owned(text.chars().flat_map(|c| (c as u32).to_be_bytes()).collect()))
	}
	if encoding.eq_ignore_ascii_case(UTF_32LE) {
		return Ok(Cow::Owned(text.chars().flat_map(|c| (c as u32).to_le_bytes()).collect()))
	}
	let enc = match encoding_rs::Encoding::for_label(encoding.as_bytes()) {
		Some(enc) => enc,
		None => return Err(Error::Encoding(EncodingError::Unsupported(encoding.to_string()))),
	};
	let (bytes, used, had_errors) = enc.encode(text);
	if had_errors || used != enc {
		return Err(Error::Encoding(EncodingError::Unmappable(enc.name())))
	}
	Ok(bytes)
}
