//! # XML Codec
//!
//! Parses scenario XML into a [`Document`] with `quick-xml` and writes it
//! back as indented UTF-8 text.
//!
//! Whitespace-only text between elements is dropped on load; the writer
//! re-creates indentation with two spaces per level. Elements whose only
//! children are character data are written on a single line.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::document::{Document, NodeId, NodeKind, Position};
use crate::error::DocumentError;

const INDENT: &str = "  ";

fn parse_err<R>(reader: &Reader<R>, reason: impl ToString) -> DocumentError {
    DocumentError::Parse {
        position: reader.buffer_position() as u64,
        reason: reason.to_string(),
    }
}

fn utf8<R>(reader: &Reader<R>, bytes: &[u8]) -> Result<String, DocumentError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| parse_err(reader, e))
}

/// Parse XML text into a document.
pub fn parse_document(xml: &str) -> Result<Document, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut doc: Option<Document> = None;
    let mut stack: Vec<NodeId> = Vec::new();
    let mut prolog: Vec<String> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| parse_err(&reader, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = utf8(&reader, e.name().as_ref())?;
                let id = match stack.last().copied() {
                    Some(parent) => doc
                        .as_mut()
                        .ok_or(DocumentError::NoRoot)?
                        .append_element(parent, &name),
                    None if doc.is_none() => {
                        let mut d = Document::new(&name);
                        for c in prolog.drain(..) {
                            d.push_prolog_comment(c);
                        }
                        let root = d.root();
                        doc = Some(d);
                        root
                    }
                    None => return Err(parse_err(&reader, "content after root element")),
                };
                let d = doc.as_mut().ok_or(DocumentError::NoRoot)?;
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| parse_err(&reader, err))?;
                    let key = utf8(&reader, attr.key.as_ref())?;
                    let value = attr
                        .unescape_value()
                        .map_err(|err| parse_err(&reader, err))?;
                    d.set_attr(id, &key, value.into_owned());
                }
                if matches!(event, Event::Start(_)) {
                    stack.push(id);
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(|err| parse_err(&reader, err))?;
                if text.trim().is_empty() {
                    continue;
                }
                match (&mut doc, stack.last()) {
                    (Some(d), Some(&parent)) => {
                        let t = d.create_text(&text);
                        d.move_node(t, parent, Position::Last)?;
                    }
                    _ => return Err(parse_err(&reader, "text outside root element")),
                }
            }
            Event::CData(ref e) => {
                let text = utf8(&reader, e)?;
                if let (Some(d), Some(&parent)) = (&mut doc, stack.last()) {
                    let t = d.create_cdata(&text);
                    d.move_node(t, parent, Position::Last)?;
                }
            }
            Event::Comment(ref e) => {
                let text = utf8(&reader, e)?;
                match (&mut doc, stack.last()) {
                    (Some(d), Some(&parent)) => {
                        let c = d.create_comment(&text);
                        d.move_node(c, parent, Position::Last)?;
                    }
                    (None, _) => prolog.push(text),
                    (Some(d), None) => d.push_epilog_comment(text),
                }
            }
            Event::PI(ref e) => {
                tracing::debug!(
                    position = reader.buffer_position(),
                    target = %String::from_utf8_lossy(e.target()),
                    "dropping processing instruction"
                );
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(parse_err(&reader, "unclosed element at end of input"));
    }
    doc.ok_or(DocumentError::NoRoot)
}

/// Serialize a document as indented XML with a UTF-8 declaration.
pub fn serialize_document(doc: &Document) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
    for c in doc.prolog() {
        out.push_str("<!--");
        out.push_str(c);
        out.push_str("-->\n");
    }
    write_node(doc, doc.root(), 0, &mut out);
    for c in doc.epilog() {
        out.push_str("<!--");
        out.push_str(c);
        out.push_str("-->\n");
    }
    out
}

fn write_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_node(doc: &Document, id: NodeId, depth: usize, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Element => write_element(doc, id, depth, out),
        NodeKind::Text => {
            write_indent(depth, out);
            out.push_str(&escape(doc.value(id).trim()));
            out.push('\n');
        }
        NodeKind::CData => {
            write_indent(depth, out);
            write_cdata(doc.value(id), out);
            out.push('\n');
        }
        NodeKind::Comment => {
            write_indent(depth, out);
            out.push_str("<!--");
            out.push_str(doc.value(id));
            out.push_str("-->\n");
        }
    }
}

fn write_cdata(text: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    out.push_str(text);
    out.push_str("]]>");
}

fn write_element(doc: &Document, id: NodeId, depth: usize, out: &mut String) {
    write_indent(depth, out);
    out.push('<');
    out.push_str(doc.name(id));
    for (k, v) in doc.attrs(id) {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape(v.as_str()));
        out.push('"');
    }

    let children = doc.children(id);
    if children.is_empty() {
        out.push_str("/>\n");
        return;
    }

    let inline = children
        .iter()
        .all(|c| matches!(doc.kind(*c), NodeKind::Text | NodeKind::CData));
    out.push('>');
    if inline {
        for c in &children {
            match doc.kind(*c) {
                NodeKind::CData => write_cdata(doc.value(*c), out),
                _ => out.push_str(&escape(doc.value(*c))),
            }
        }
    } else {
        out.push('\n');
        for c in &children {
            write_node(doc, *c, depth + 1, out);
        }
        write_indent(depth, out);
    }
    out.push_str("</");
    out.push_str(doc.name(id));
    out.push_str(">\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- header -->
<scenario schemaVersion="3" name="a &amp; b">
    <demography>
        <ageGroup lowerbound="0">
            <group upperbound="1" poppercent="3.47"/>
        </ageGroup>
    </demography>
    <!-- inner -->
    <item>12.5</item>
    <note><![CDATA[x < y]]></note>
</scenario>
"#;

    #[test]
    fn parse_builds_tree() {
        let doc = parse_document(SAMPLE).unwrap();
        let root = doc.root();
        assert_eq!(doc.name(root), "scenario");
        assert_eq!(doc.attr(root, "name"), Some("a & b"));
        assert_eq!(doc.version().unwrap().get(), 3);
        let group = doc
            .require_path(root, &["demography", "ageGroup", "group"])
            .unwrap();
        assert_eq!(doc.attr(group, "poppercent"), Some("3.47"));
        let item = doc.require_child(root, "item").unwrap();
        assert_eq!(doc.text_parse::<f64>(item).unwrap(), 12.5);
        let note = doc.require_child(root, "note").unwrap();
        assert_eq!(doc.text(note), "x < y");
        assert_eq!(doc.prolog(), &[" header ".to_string()]);
    }

    #[test]
    fn trailing_comments_survive_round_trip() {
        let xml = "<!-- head --><scenario schemaVersion=\"3\"/>\n<!-- tail -->\n<!-- end -->\n";
        let doc = parse_document(xml).unwrap();
        assert_eq!(doc.epilog(), &[" tail ".to_string(), " end ".to_string()]);

        let out = serialize_document(&doc);
        assert!(out.ends_with("<scenario schemaVersion=\"3\"/>\n<!-- tail -->\n<!-- end -->\n"));
        let again = parse_document(&out).unwrap();
        assert_eq!(again.prolog(), doc.prolog());
        assert_eq!(again.epilog(), doc.epilog());
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let doc = parse_document(SAMPLE).unwrap();
        let demography = doc.require_child(doc.root(), "demography").unwrap();
        assert_eq!(doc.children(demography).len(), 1);
    }

    #[test]
    fn serialize_indents_two_spaces() {
        let doc = parse_document(SAMPLE).unwrap();
        let out = serialize_document(&doc);
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\""));
        assert!(out.contains("<scenario schemaVersion=\"3\" name=\"a &amp; b\">\n"));
        assert!(out.contains("\n  <demography>\n    <ageGroup lowerbound=\"0\">\n"));
        assert!(out.contains("      <group upperbound=\"1\" poppercent=\"3.47\"/>\n"));
        assert!(out.contains("  <item>12.5</item>\n"));
        assert!(out.contains("  <!-- inner -->\n"));
        assert!(out.contains("<note><![CDATA[x < y]]></note>"));
    }

    #[test]
    fn reparse_of_output_is_stable() {
        let once = serialize_document(&parse_document(SAMPLE).unwrap());
        let twice = serialize_document(&parse_document(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            parse_document("<scenario><a></scenario>"),
            Err(DocumentError::Parse { .. })
        ));
        assert!(matches!(parse_document(""), Err(DocumentError::NoRoot)));
    }

    #[test]
    fn unclosed_root_is_rejected() {
        assert!(parse_document("<scenario><a/>").is_err());
    }
}
