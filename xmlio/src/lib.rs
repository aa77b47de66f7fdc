/*!
# Streaming XML input and output

This crate reads and writes namespace-aware XML 1.0 documents as streams of
structural events.

## Features

* Pull parsing with depth tracking and namespace resolution ([`Tokenizer`])
* Encoding detection from byte order marks, byte patterns and the XML
  declaration, with decoding of UTF-8, UTF-16, UTF-32 and the legacy
  encodings known to `encoding_rs` ([`encoding`])
* Writing with optional namespace repair and "smart" start tags which only
  declare what is not yet in scope ([`Writer`])
* Capturing parts of a document together with the namespace bindings they
  need, and parsing them again later on their own ([`fragment`])
* A delegation base for reader and writer decorators ([`delegate`])

## Not supported

* External entities and DTD processing; the document type declaration is
  passed through verbatim
* XML 1.1
* Asynchronous I/O

## Example

```
use xmlio::{Event, Tokenizer, Writer, XmlReader, XmlWrite};

let mut tok = Tokenizer::from_str("<greeting xmlns='urn:example'>Hello!</greeting>");
let mut w = Writer::new(Vec::new());
loop {
	let ev = tok.next().unwrap();
	w.write_event(&ev).unwrap();
	if let Event::EndDocument(..) = ev {
		break
	}
}
assert_eq!(w.into_inner(), b"<greeting xmlns=\"urn:example\">Hello!</greeting>".to_vec());
```

## High-level usage

### Reading

Every event source implements [`XmlReader`]. Besides reading single events,
the trait provides navigation helpers like [`XmlReader::next_tag`] and
[`XmlReader::read_text`]. To parse bytes in an unknown encoding, use
[`Tokenizer::from_bytes`].

### Writing

[`Writer`] implements [`XmlWrite`] on top of any [`bytes::BufMut`]. Events
read from a reader can be written with [`XmlWrite::write_event`] or piped
wholesale with [`copy_events`].

### Fragments

[`Fragment::capture`] serializes the rest of the enclosing element from a
reader; [`Fragment::reader`] parses it again.
*/
pub mod error;
pub mod strings;
mod context;
pub mod namespaces;
pub mod lexer;
pub mod parser;
pub mod reader;
pub mod delegate;
pub mod encoding;
pub mod writer;
pub mod fragment;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use error::{EncodingError, Error, Position, Result, StructureError};
#[doc(inline)]
pub use lexer::{Lexer, LexerOptions};
#[doc(inline)]
pub use namespaces::{NamespaceBinding, NamespaceContext, NamespaceSnapshot, NamespaceStack, RcPtr, XMLNS_XML, XMLNS_XMLNS};
#[doc(inline)]
pub use parser::{Attribute, Event, EventMetrics, QName, ReaderOptions, Tokenizer, XMLVersion, XmlDeclaration};
#[doc(inline)]
pub use reader::XmlReader;
#[doc(inline)]
pub use writer::{copy_events, Writer, WriterOptions, XmlDeclMode, XmlWrite};
#[doc(inline)]
pub use fragment::{Fragment, FragmentReader};
pub use strings::{CData, NCName, Name};
pub use context::Context;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
