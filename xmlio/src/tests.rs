use super::*;

use crate::encoding::Detection;

fn collect<R: XmlReader>(r: &mut R) -> Vec<Event> {
	let mut out = Vec::new();
	loop {
		let ev = r.next().unwrap();
		let end = matches!(ev, Event::EndDocument(..));
		out.push(ev);
		if end {
			return out
		}
	}
}

/// Strip metrics so that events from different sources can be compared.
fn shape(events: &[Event]) -> Vec<(&'static str, usize, String)> {
	events.iter().map(|ev| {
		let detail = match ev {
			Event::StartElement(_, name, attrs, _) => {
				let mut s = name.to_string();
				for attr in attrs.iter() {
					s.push_str(&format!(" {}={:?}", attr.name, attr.value.as_str()));
				}
				s
			},
			Event::EndElement(_, name) => name.to_string(),
			Event::Text(_, t) | Event::CData(_, t) | Event::Comment(_, t) | Event::IgnorableWhitespace(_, t) => t.to_string(),
			Event::ProcessingInstruction(_, target, data) => format!("{} {}", target, data),
			_ => String::new(),
		};
		(ev.name(), ev.depth(), detail)
	}).collect()
}

fn roundtrip(doc: &str) -> String {
	let mut tok = Tokenizer::from_str(doc);
	let mut w = Writer::new(Vec::new());
	copy_events(&mut tok, &mut w).unwrap();
	String::from_utf8(w.into_inner()).unwrap()
}

#[test]
fn start_and_end_depths_match() {
	let mut tok = Tokenizer::from_str("<a><b><c/>x</b><d>y<e/></d></a>");
	let events = collect(&mut tok);
	let mut open = Vec::new();
	for ev in events.iter() {
		match ev {
			Event::StartElement(m, ..) => {
				assert_eq!(m.depth(), open.len() + 1);
				open.push(m.depth());
			},
			Event::EndElement(m, _) => assert_eq!(Some(m.depth()), open.pop()),
			Event::Text(m, _) => assert_eq!(m.depth(), open.len()),
			_ => (),
		}
	}
	assert!(open.is_empty());
}

#[test]
fn writer_output_parses_to_same_events() {
	let doc = "<?xml version='1.0'?>\n<!--head--><r xmlns='urn:r' xmlns:p='urn:p' p:a='1&amp;2'>text &lt; more<p:c><![CDATA[x]]></p:c><?pi data?><e/></r>\n";
	let original = collect(&mut Tokenizer::from_str(doc));
	let written = roundtrip(doc);
	let reparsed = collect(&mut Tokenizer::from_str(&written));
	assert_eq!(shape(&original), shape(&reparsed));
}

#[test]
fn roundtrip_preserves_specials() {
	let written = roundtrip("<a x='&quot;&lt;&#9;'>]]&gt; &amp;</a>");
	assert_eq!(written, "<a x=\"&#34;&lt;&#x9;\">]]&gt; &amp;</a>");
}

#[test]
fn smart_start_tag_declares_once() {
	let mut w = Writer::new(Vec::new());
	w.smart_start_tag("", "urn:a", "outer").unwrap();
	w.smart_start_tag("", "urn:a", "inner").unwrap();
	w.smart_start_tag("b", "urn:b", "other").unwrap();
	w.end_document().unwrap();
	assert_eq!(
		String::from_utf8(w.into_inner()).unwrap(),
		"<outer xmlns=\"urn:a\"><inner><b:other xmlns:b=\"urn:b\"/></inner></outer>",
	);
}

#[test]
fn repair_mode_output_is_namespace_well_formed() {
	let mut w = Writer::with_options(Vec::new(), WriterOptions::default().repair_namespaces(true));
	w.start_tag("urn:one", "a").unwrap();
	w.attribute("urn:two", "x", "1").unwrap();
	w.start_tag("urn:two", "b").unwrap();
	w.start_tag("", "c").unwrap();
	w.end_document().unwrap();
	let out = String::from_utf8(w.into_inner()).unwrap();
	let events = collect(&mut Tokenizer::from_str(&out));
	let names: Vec<String> = events.iter().filter_map(|ev| match ev {
		Event::StartElement(_, name, ..) => Some(name.to_string()),
		_ => None,
	}).collect();
	assert_eq!(names, vec!["{urn:one}a", "{urn:two}b", "c"]);
	match &events[1] {
		Event::StartElement(_, _, attrs, _) => assert_eq!(attrs[0].name.to_string(), "{urn:two}x"),
		other => panic!("unexpected event: {:?}", other),
	}
}

#[test]
fn fragment_replays_equivalent_events() {
	let doc = "<r xmlns='urn:r' xmlns:p='urn:p'><head/><body p:a='1'>t<p:x><y xmlns='urn:y'/></p:x><!--c--></body></r>";
	let mut tok = Tokenizer::from_str(doc);
	tok.next().unwrap();
	tok.next().unwrap();
	tok.next().unwrap();
	tok.next().unwrap();
	// positioned on the start of body
	let mut original = vec![tok.next().unwrap()];
	loop {
		let ev = tok.next().unwrap();
		if matches!(ev, Event::EndElement(m, _) if m.depth() == 1) {
			break
		}
		original.push(ev);
	}

	let mut tok = Tokenizer::from_str(doc);
	for _ in 0..5 {
		tok.next().unwrap();
	}
	let fragment = Fragment::capture(&mut tok).unwrap();
	let mut replayed = collect(&mut fragment.reader().unwrap());
	assert!(matches!(replayed.pop(), Some(Event::EndDocument(..))));
	let original: Vec<Event> = original.into_iter().map(|ev| {
		let depth = ev.depth() - 1;
		ev.with_depth(depth)
	}).collect();
	assert_eq!(shape(&original), shape(&replayed));
}

#[test]
fn fragment_survives_storage_as_parts() {
	let mut tok = Tokenizer::from_str("<r xmlns:p='urn:p'><p:a>1</p:a></r>");
	tok.next().unwrap();
	tok.next().unwrap();
	tok.next().unwrap();
	let (content, namespaces) = Fragment::capture(&mut tok).unwrap().into_parts();
	let stored = content.to_vec();
	let fragment = Fragment::from_parts(stored.into(), namespaces);
	let mut r = fragment.reader().unwrap();
	r.require_start(Some("urn:p"), "a").unwrap();
	assert_eq!(r.read_text().unwrap(), "1");
}

#[test]
fn fragment_reader_writes_into_other_document() {
	let mut tok = Tokenizer::from_str("<r xmlns:p='urn:p'><p:a/><p:b/></r>");
	tok.next().unwrap();
	tok.next().unwrap();
	tok.next().unwrap();
	let fragment = Fragment::capture(&mut tok).unwrap();

	let mut w = Writer::with_options(Vec::new(), WriterOptions::default().repair_namespaces(true));
	w.start_tag("", "wrap").unwrap();
	let mut r = fragment.reader().unwrap();
	loop {
		match r.next().unwrap() {
			Event::EndDocument(..) => break,
			ev => w.write_event(&ev).unwrap(),
		}
	}
	w.end_document().unwrap();
	assert_eq!(
		String::from_utf8(w.into_inner()).unwrap(),
		"<wrap><p:a xmlns:p=\"urn:p\"/><p:b xmlns:p=\"urn:p\"/></wrap>",
	);
}

#[test]
fn from_bytes_decodes_declared_latin1() {
	let doc = b"<?xml version='1.0' encoding='ISO-8859-1'?><a>caf\xe9</a>";
	let mut tok = Tokenizer::from_bytes(&doc[..], ReaderOptions::default()).unwrap();
	assert_eq!(tok.encoding(), "ISO-8859-1");
	assert_eq!(tok.get_ref().detection(), Detection::Declaration);
	match tok.next().unwrap() {
		Event::StartDocument(_, Some(decl)) => assert_eq!(decl.encoding.unwrap(), "ISO-8859-1"),
		other => panic!("unexpected event: {:?}", other),
	}
	tok.next().unwrap();
	assert_eq!(tok.read_text().unwrap(), "café");
}

#[test]
fn from_bytes_detects_utf16_by_bom() {
	let mut doc = vec![0xff, 0xfe];
	doc.extend("<a>x</a>".encode_utf16().flat_map(|u| u.to_le_bytes()));
	let mut tok = Tokenizer::from_bytes(&doc[..], ReaderOptions::default()).unwrap();
	assert_eq!(tok.encoding(), "UTF-16LE");
	assert_eq!(tok.get_ref().detection(), Detection::ByteOrderMark);
	tok.next().unwrap();
	tok.require_start(None, "a").unwrap();
	assert_eq!(tok.read_text().unwrap(), "x");
}

#[test]
fn from_bytes_detects_utf16_by_pattern() {
	let doc: Vec<u8> = "<?xml version='1.0'?><a/>".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
	let tok = Tokenizer::from_bytes(&doc[..], ReaderOptions::default()).unwrap();
	assert_eq!(tok.encoding(), "UTF-16BE");
	assert_eq!(tok.get_ref().detection(), Detection::Pattern);
}

#[test]
fn from_bytes_defaults_to_utf8() {
	let tok = Tokenizer::from_bytes(&b"<a>\xc3\xa9</a>"[..], ReaderOptions::default()).unwrap();
	assert_eq!(tok.encoding(), "UTF-8");
	assert_eq!(tok.get_ref().detection(), Detection::Default);
}

#[test]
fn from_bytes_uses_explicit_encoding() {
	let mut tok = Tokenizer::from_bytes(&b"<a>\xe9</a>"[..], ReaderOptions::default().encoding("windows-1252")).unwrap();
	tok.next().unwrap();
	tok.next().unwrap();
	assert_eq!(tok.read_text().unwrap(), "é");
}

#[test]
fn malformed_declaration_fails_before_events() {
	match Tokenizer::from_bytes(&b"<?xml version='1.0' encoding 'UTF-8'?><a/>"[..], ReaderOptions::default()) {
		Err(Error::Encoding(EncodingError::MissingEquals)) => (),
		other => panic!("unexpected result: {:?}", other.map(|_| ())),
	}
	match Tokenizer::from_bytes(&b"<?xml version='1.0' encoding=UTF-8?><a/>"[..], ReaderOptions::default()) {
		Err(Error::Encoding(EncodingError::MissingQuote)) => (),
		other => panic!("unexpected result: {:?}", other.map(|_| ())),
	}
	match Tokenizer::from_bytes(&b"<?xml version='1.0' encoding='x-nonsense'?><a/>"[..], ReaderOptions::default()) {
		Err(Error::Encoding(EncodingError::Unsupported(_))) => (),
		other => panic!("unexpected result: {:?}", other.map(|_| ())),
	}
}

#[test]
fn relaxed_sniffing_accepts_spaces() {
	let doc = b"<?xml version='1.0' encoding = 'ISO-8859-1'?><a>\xe9</a>";
	assert!(Tokenizer::from_bytes(&doc[..], ReaderOptions::default()).is_err());
	let mut tok = Tokenizer::from_bytes(&doc[..], ReaderOptions::default().relaxed(true)).unwrap();
	tok.next().unwrap();
	tok.next().unwrap();
	assert_eq!(tok.read_text().unwrap(), "é");
}

#[test]
fn writer_transcodes_for_declared_encoding() {
	let opts = WriterOptions::default().encoding("ISO-8859-1").xml_declaration(XmlDeclMode::Auto);
	let mut w = Writer::with_options(Vec::new(), opts);
	w.start_tag("", "a").unwrap();
	w.text("café").unwrap();
	w.end_document().unwrap();
	let out = w.into_inner();
	assert_eq!(out, b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>caf\xe9</a>".to_vec());
	let mut tok = Tokenizer::from_bytes(&out[..], ReaderOptions::default()).unwrap();
	tok.next().unwrap();
	tok.next().unwrap();
	assert_eq!(tok.read_text().unwrap(), "café");
}

#[test]
fn end_document_is_terminal_everywhere() {
	let mut tok = Tokenizer::from_str("<a/>");
	collect(&mut tok);
	assert!(matches!(tok.next().unwrap(), Event::EndDocument(..)));

	let fragment = Fragment::from_parts(bytes::Bytes::from_static(b"<a/>"), Vec::new());
	let mut r = fragment.reader().unwrap();
	collect(&mut r);
	assert!(matches!(r.next().unwrap(), Event::EndDocument(..)));

	let mut f = delegate::EventFilter::new(Tokenizer::from_str("<a/>"), |_: &Event| true);
	collect(&mut f);
	assert!(matches!(f.next().unwrap(), Event::EndDocument(..)));
}

#[test]
fn errors_carry_positions() {
	let mut tok = Tokenizer::from_str("<a>\n  <b></c>\n</a>");
	let err = loop {
		match tok.next() {
			Ok(_) => (),
			Err(e) => break e,
		}
	};
	let pos = err.location().unwrap();
	assert_eq!(pos.line, 2);
	assert!(err.is_syntax_error());
}

#[test]
fn doctype_passes_through() {
	let written = roundtrip("<!DOCTYPE html><html/>");
	assert_eq!(written, "<!DOCTYPE html><html/>");
}

#[test]
fn token_length_limit_is_configurable() {
	let comment = format!("<a><!--{}--></a>", "c".repeat(10000));
	let attribute = format!("<a v='{}'/>", "v".repeat(10000));
	for doc in [&comment, &attribute].iter() {
		let mut tok = Tokenizer::from_str(doc);
		let err = loop {
			match tok.next() {
				Ok(Event::EndDocument(..)) => panic!("long token accepted: {:?}", &doc[..20]),
				Ok(_) => (),
				Err(e) => break e,
			}
		};
		assert!(matches!(err, Error::RestrictedXml(..)));

		let opts = ReaderOptions::default().lexer(LexerOptions::default().max_token_length(1 << 16));
		let mut tok = Tokenizer::with_options(doc.as_bytes(), opts);
		collect(&mut tok);
	}

	let opts = ReaderOptions::default().lexer(LexerOptions::default().max_token_length(1 << 16));
	let mut tok = Tokenizer::with_options(attribute.as_bytes(), opts);
	tok.next().unwrap();
	match tok.next().unwrap() {
		Event::StartElement(_, _, attributes, _) => assert_eq!(attributes[0].value.len(), 10000),
		other => panic!("unexpected event: {:?}", other),
	}
}

#[test]
fn long_text_is_split_not_rejected() {
	let doc = format!("<a>{}</a>", "t".repeat(20000));
	let mut tok = Tokenizer::from_str(&doc);
	let events = collect(&mut tok);
	let mut text = String::new();
	for ev in events.iter() {
		if let Event::Text(_, t) = ev {
			text.push_str(t);
		}
	}
	assert_eq!(text.len(), 20000);
	assert!(events.iter().filter(|ev| matches!(ev, Event::Text(..))).count() > 1);
}

#[test]
fn from_bytes_reads_stylesheet_pi_first() {
	let doc = b"<?xml-stylesheet href='a.xsl' type='text/xsl'?><a/>";
	let mut tok = Tokenizer::from_bytes(&doc[..], ReaderOptions::default()).unwrap();
	assert_eq!(tok.encoding(), "UTF-8");
	let events = collect(&mut tok);
	match &events[1] {
		Event::ProcessingInstruction(_, target, _) => assert_eq!(target.as_str(), "xml-stylesheet"),
		other => panic!("unexpected event: {:?}", other),
	}
}
