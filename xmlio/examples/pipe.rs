use std::env;
use std::io;
use std::io::Write;

use bytes::BytesMut;

use xmlio::{Error, Event, ReaderOptions, Tokenizer, Writer, WriterOptions, XmlDeclMode, XmlReader, XmlWrite};

fn main() {
	let encoding = env::args().nth(1).unwrap_or_else(|| "UTF-8".to_string());
	let mut tok = match Tokenizer::from_bytes(io::stdin(), ReaderOptions::default()) {
		Ok(tok) => tok,
		Err(e) => panic!("cannot read input: {}", e),
	};
	let opts = WriterOptions::default()
		.encoding(encoding)
		.xml_declaration(XmlDeclMode::Auto);
	let mut w = Writer::with_options(BytesMut::with_capacity(8192), opts);
	let mut stdout = io::stdout();
	loop {
		let ev = match tok.next() {
			Ok(ev) => ev,
			Err(Error::IO(e, _)) => panic!("I/O error: {}", e),
			Err(e) => panic!("invalid XML on input: {}", e),
		};
		w.write_event(&ev).expect("failed to encode xml");
		let buf = w.get_mut();
		stdout.write_all(&buf[..]).expect("failed to write to stdout");
		buf.clear();
		if let Event::EndDocument(..) = ev {
			break
		}
	}
}
