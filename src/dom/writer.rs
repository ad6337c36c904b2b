//! XML serialization of arena documents
//!
//! Escaping scans for the few bytes that need replacing with `memchr`
//! and copies the runs in between unchanged.

use memchr::{memchr2, memchr3};

use super::document::XmlDocument;
use super::node::{NodeId, NodeKind, DOCUMENT_NODE};
use crate::qname::prefixed;

/// Serialization options
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>`
    pub xml_declaration: bool,
    /// Indent element-only content
    pub formatted: bool,
    /// Indentation unit when `formatted` is set
    pub indent: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            xml_declaration: false,
            formatted: false,
            indent: "  ".to_string(),
        }
    }
}

impl XmlDocument {
    /// Serialize the whole document
    pub fn to_xml_string(&self, options: &WriteOptions) -> String {
        let mut out = String::with_capacity(256);
        if options.xml_declaration {
            out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
            if options.formatted {
                out.push('\n');
            }
        }
        for child in self.children(DOCUMENT_NODE) {
            write_node(self, child, options, 0, &mut out);
        }
        out
    }

    /// Serialize one element subtree on its own, declaring every namespace it
    /// relies on at its root.
    pub fn subtree_to_string(&self, id: NodeId) -> String {
        let element = self.extract_element(id);
        let mut standalone = XmlDocument::new();
        standalone.import_element(DOCUMENT_NODE, &element);
        standalone.to_xml_string(&WriteOptions::default())
    }
}

fn write_node(doc: &XmlDocument, id: NodeId, options: &WriteOptions, depth: usize, out: &mut String) {
    let Some(node) = doc.get_node(id) else {
        return;
    };
    match node.kind {
        NodeKind::Text => escape_text(doc.text_content(id).unwrap_or(""), out),
        NodeKind::CData => {
            out.push_str("<![CDATA[");
            // a literal "]]>" has to be split across two sections
            out.push_str(&doc.text_content(id).unwrap_or("").replace("]]>", "]]]]><![CDATA[>"));
            out.push_str("]]>");
        }
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, child, options, depth, out);
            }
        }
        NodeKind::Element => write_element(doc, id, options, depth, out),
    }
}

fn write_element(doc: &XmlDocument, id: NodeId, options: &WriteOptions, depth: usize, out: &mut String) {
    let name = prefixed(doc.prefix(id).unwrap_or(""), doc.local_name(id).unwrap_or(""));
    out.push('<');
    out.push_str(&name);

    for decl in doc.namespace_decls(id) {
        let prefix = doc.strings.get(decl.prefix_id).unwrap_or("");
        out.push_str(" xmlns");
        if !prefix.is_empty() {
            out.push(':');
            out.push_str(prefix);
        }
        out.push_str("=\"");
        escape_attribute(doc.strings.get(decl.uri_id).unwrap_or(""), out);
        out.push('"');
    }
    for attr in doc.attributes(id) {
        out.push(' ');
        out.push_str(&prefixed(
            doc.strings.get(attr.prefix_id).unwrap_or(""),
            doc.strings.get(attr.name_id).unwrap_or(""),
        ));
        out.push_str("=\"");
        escape_attribute(doc.strings.get(attr.value_id).unwrap_or(""), out);
        out.push('"');
    }

    let children: Vec<NodeId> = doc.children(id).collect();
    if children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    // Mixed content is written verbatim; only element-only content is indented
    let indent = options.formatted
        && children
            .iter()
            .all(|&c| doc.get_node(c).map(|n| n.is_element()).unwrap_or(false));
    for &child in &children {
        if indent {
            out.push('\n');
            push_indent(options, depth + 1, out);
        }
        write_node(doc, child, options, depth + 1, out);
    }
    if indent {
        out.push('\n');
        push_indent(options, depth, out);
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn push_indent(options: &WriteOptions, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(&options.indent);
    }
}

/// Escape character data (`&`, `<`, `>`)
pub fn escape_text(text: &str, out: &mut String) {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(pos) = memchr3(b'&', b'<', b'>', &bytes[start..]) {
        let at = start + pos;
        out.push_str(&text[start..at]);
        out.push_str(match bytes[at] {
            b'&' => "&amp;",
            b'<' => "&lt;",
            _ => "&gt;",
        });
        start = at + 1;
    }
    out.push_str(&text[start..]);
}

/// Escape an attribute value (`&`, `<`, `"` plus whitespace that would be normalized)
pub fn escape_attribute(value: &str, out: &mut String) {
    let bytes = value.as_bytes();
    let mut start = 0;
    loop {
        let rest = &bytes[start..];
        let special = [memchr3(b'&', b'<', b'"', rest), memchr2(b'\n', b'\t', rest)]
            .into_iter()
            .flatten()
            .min();
        let Some(pos) = special else { break };
        let at = start + pos;
        out.push_str(&value[start..at]);
        out.push_str(match bytes[at] {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'"' => "&quot;",
            b'\n' => "&#10;",
            _ => "&#9;",
        });
        start = at + 1;
    }
    out.push_str(&value[start..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_text() {
        let mut out = String::new();
        escape_text("a < b && c > d", &mut out);
        assert_eq!(out, "a &lt; b &amp;&amp; c &gt; d");
    }

    #[test]
    fn test_escape_attribute() {
        let mut out = String::new();
        escape_attribute("say \"hi\"\n&", &mut out);
        assert_eq!(out, "say &quot;hi&quot;&#10;&amp;");
    }

    #[test]
    fn test_round_trip_text() {
        let input = r#"<a:root xmlns:a="urn:a" k="v"><a:b>x &amp; y</a:b><c/></a:root>"#;
        let doc = XmlDocument::parse(input).unwrap();
        assert_eq!(doc.to_xml_string(&WriteOptions::default()), input);
    }

    #[test]
    fn test_formatted() {
        let doc = XmlDocument::parse("<r><a>1</a><b/></r>").unwrap();
        let options = WriteOptions {
            xml_declaration: true,
            formatted: true,
            ..WriteOptions::default()
        };
        assert_eq!(
            doc.to_xml_string(&options),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r>\n  <a>1</a>\n  <b/>\n</r>"
        );
    }

    #[test]
    fn test_cdata() {
        let mut doc = XmlDocument::new();
        let root = doc.create_element(DOCUMENT_NODE, None, "r", "");
        doc.append_text(root, "<b>", true);
        assert_eq!(
            doc.to_xml_string(&WriteOptions::default()),
            "<r><![CDATA[<b>]]></r>"
        );
    }

    #[test]
    fn test_subtree_to_string() {
        let doc = XmlDocument::parse(
            r#"<root xmlns:x="urn:x"><x:extra a="1"><x:y>t</x:y></x:extra></root>"#,
        )
        .unwrap();
        let root = doc.root_element_id().unwrap();
        let extra = doc.element_children(root).next().unwrap();
        assert_eq!(
            doc.subtree_to_string(extra),
            r#"<x:extra xmlns:x="urn:x" a="1"><x:y>t</x:y></x:extra>"#
        );
    }
}
