use super::ranges::ByteSelect;

/// Reason for a scan to stop.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Endbyte {
	/// The source has no more data.
	Eof,
	/// The length limit was reached.
	Limit,
	/// A byte not matched by the selector was found. It is not consumed.
	Delimiter(u8),
}

/// Number of leading bytes of `src` matched by the selector.
pub fn count_matching<B: ByteSelect>(src: &[u8], selector: &B) -> usize {
	src.iter().position(|b| !selector.select(*b)).unwrap_or(src.len())
}

/// Number of continuation bytes missing to complete the UTF-8 sequence at
/// the end of `buf`.
///
/// Invalid sequences count as complete; they are rejected when the buffer
/// is decoded.
pub fn utf8_missing(buf: &[u8]) -> usize {
	let tail = &buf[buf.len().saturating_sub(4)..];
	for (i, b) in tail.iter().enumerate().rev() {
		if b & 0xc0 == 0x80 {
			continue;
		}
		let width: usize = match b {
			0x00..=0x7f => 1,
			0xc0..=0xdf => 2,
			0xe0..=0xef => 3,
			0xf0..=0xf7 => 4,
			_ => return 0,
		};
		let have = tail.len() - i;
		return width.saturating_sub(have);
	}
	0
}
