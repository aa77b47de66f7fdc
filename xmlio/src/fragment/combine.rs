use std::fmt;
use std::io;
use std::io::{BufRead, Read, Seek, SeekFrom};

/**
# Concatenation of several buffered sources

Each source is read until it is exhausted, then the next one takes over.
Nothing is copied between the sources and the combined stream.

```
use std::io::{Cursor, Read};
use xmlio::fragment::CombiningReader;

let mut r = CombiningReader::new(vec![Cursor::new(&b"<a>"[..]), Cursor::new(&b"</a>"[..])]);
let mut s = String::new();
r.read_to_string(&mut s).unwrap();
assert_eq!(s, "<a></a>");
```

Exhausted sources are kept until the reader is dropped, so that a combining
reader over [`Seek`] sources can be [`reset`](CombiningReader::reset).
*/
pub struct CombiningReader<R> {
	sources: Vec<R>,
	index: usize,
}

impl<R> CombiningReader<R> {
	pub fn new(sources: Vec<R>) -> Self {
		Self{sources, index: 0}
	}

	/// Index of the source currently being read.
	pub fn active(&self) -> usize {
		self.index
	}

	pub fn into_inner(self) -> Vec<R> {
		self.sources
	}
}

impl<R: Seek> CombiningReader<R> {
	/// Rewind every source to its start and read from the first one again.
	///
	/// The first failing seek aborts the reset; the reader is then left at
	/// an unspecified position and should be dropped.
	pub fn reset(&mut self) -> io::Result<()> {
		for src in self.sources.iter_mut() {
			src.seek(SeekFrom::Start(0))?;
		}
		self.index = 0;
		Ok(())
	}
}

impl<R: BufRead> BufRead for CombiningReader<R> {
	fn fill_buf(&mut self) -> io::Result<&[u8]> {
		while self.index < self.sources.len() {
			if self.sources[self.index].fill_buf()?.is_empty() {
				self.index += 1;
				continue;
			}
			return self.sources[self.index].fill_buf()
		}
		Ok(&[])
	}

	fn consume(&mut self, amt: usize) {
		if let Some(src) = self.sources.get_mut(self.index) {
			src.consume(amt);
		}
	}
}

impl<R: BufRead> Read for CombiningReader<R> {
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

impl<R> fmt::Debug for CombiningReader<R> {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("CombiningReader")
			.field("sources", &self.sources.len())
			.field("index", &self.index)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::io::Cursor;

	fn read_all<R: BufRead>(r: &mut CombiningReader<R>) -> Vec<u8> {
		let mut out = Vec::new();
		r.read_to_end(&mut out).unwrap();
		out
	}

	#[test]
	fn reads_sources_in_order() {
		let mut r = CombiningReader::new(vec![
			Cursor::new(b"one ".to_vec()),
			Cursor::new(Vec::new()),
			Cursor::new(b"two".to_vec()),
		]);
		assert_eq!(read_all(&mut r), b"one two");
		assert_eq!(r.active(), 3);
	}

	#[test]
	fn fill_buf_never_spans_sources() {
		let mut r = CombiningReader::new(vec![Cursor::new(&b"ab"[..]), Cursor::new(&b"cd"[..])]);
		assert_eq!(r.fill_buf().unwrap(), b"ab");
		r.consume(1);
		assert_eq!(r.fill_buf().unwrap(), b"b");
		r.consume(1);
		assert_eq!(r.fill_buf().unwrap(), b"cd");
		r.consume(2);
		assert_eq!(r.fill_buf().unwrap(), b"");
	}

	#[test]
	fn empty_reader_is_at_eof() {
		let mut r: CombiningReader<Cursor<Vec<u8>>> = CombiningReader::new(Vec::new());
		assert_eq!(read_all(&mut r), b"");
	}

	#[test]
	fn reset_rewinds_all_sources() {
		let mut r = CombiningReader::new(vec![Cursor::new(&b"<a>"[..]), Cursor::new(&b"x"[..]), Cursor::new(&b"</a>"[..])]);
		assert_eq!(read_all(&mut r), b"<a>x</a>");
		r.reset().unwrap();
		assert_eq!(r.active(), 0);
		assert_eq!(read_all(&mut r), b"<a>x</a>");
	}

	#[test]
	fn reset_in_the_middle() {
		let mut r = CombiningReader::new(vec![Cursor::new(&b"abc"[..]), Cursor::new(&b"def"[..])]);
		let mut buf = [0u8; 4];
		r.read_exact(&mut buf[..3]).unwrap();
		r.read_exact(&mut buf[..1]).unwrap();
		r.reset().unwrap();
		assert_eq!(read_all(&mut r), b"abcdef");
	}
}
