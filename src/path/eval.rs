//! Path evaluation against a tree record
//!
//! Intermediate element steps always select a single node: the first match,
//! or the n-th for a positional step. Only [`select`] fans out, and only on
//! the last element step.

use super::{Fragment, Lookup, Path};
use crate::dom::NodeId;
use crate::record::{TreeRecord, WriteRecord};

/// n-th (1-based, default first) child of `node` matching `fragment`
fn child_at(tree: &dyn TreeRecord, node: NodeId, fragment: &Fragment) -> Option<NodeId> {
    let wanted = fragment.position.unwrap_or(1);
    tree.element_children(node)
        .into_iter()
        .filter(|&c| tree.matches(c, fragment.namespace.as_deref(), &fragment.local_name))
        .nth(wanted - 1)
}

/// Follow the element steps among `fragments` from `node`
pub fn locate<'f>(
    tree: &dyn TreeRecord,
    node: NodeId,
    fragments: impl Iterator<Item = &'f Fragment>,
) -> Option<NodeId> {
    let mut current = node;
    for fragment in fragments {
        if fragment.is_element() {
            current = child_at(tree, current, fragment)?;
        }
    }
    Some(current)
}

/// Value of `path`'s terminal step at an already located element
pub fn value_at(tree: &dyn TreeRecord, node: NodeId, path: &Path) -> Option<String> {
    match path.last() {
        Some(f) if f.is_attribute() => tree
            .attribute(node, f.namespace.as_deref(), &f.local_name)
            .map(str::to_string),
        _ => Some(tree.text_content(node)),
    }
}

/// Single value addressed by `path` from `node`
pub fn extract(tree: &dyn TreeRecord, node: NodeId, path: &Path) -> Lookup {
    let Some(element) = locate(tree, node, path.fragments().iter()) else {
        return Lookup::NoEntry;
    };
    match value_at(tree, element, path) {
        Some(value) => Lookup::Found {
            node: element,
            value,
        },
        None => Lookup::NoEntry,
    }
}

/// All elements addressed by the element steps of `path`. The last element
/// step selects every match unless it is positional; a path without element
/// steps selects `node` itself.
pub fn select(tree: &dyn TreeRecord, node: NodeId, path: &Path) -> Vec<NodeId> {
    let Some(last) = path.last_element() else {
        return vec![node];
    };
    let Some(parent) = locate(tree, node, path.parent_fragments().iter()) else {
        return Vec::new();
    };
    if last.position.is_some() {
        return child_at(tree, parent, last).into_iter().collect();
    }
    tree.element_children(parent)
        .into_iter()
        .filter(|&c| tree.matches(c, last.namespace.as_deref(), &last.local_name))
        .collect()
}

/// One value per addressed node, in document order
pub fn extract_all(tree: &dyn TreeRecord, node: NodeId, path: &Path) -> Vec<String> {
    select(tree, node, path)
        .into_iter()
        .filter_map(|n| value_at(tree, n, path))
        .collect()
}

fn create_step(rec: &mut WriteRecord<'_>, parent: NodeId, fragment: &Fragment) -> NodeId {
    rec.create_child(
        parent,
        fragment.namespace.as_deref(),
        &fragment.local_name,
        fragment.preferred_prefix(),
    )
}

/// Find the n-th match of `fragment`, creating siblings until it exists
fn locate_or_create_step(rec: &mut WriteRecord<'_>, parent: NodeId, fragment: &Fragment) -> NodeId {
    let wanted = fragment.position.unwrap_or(1);
    let mut found = 0;
    for child in rec.tree().element_children(parent) {
        if rec
            .tree()
            .matches(child, fragment.namespace.as_deref(), &fragment.local_name)
        {
            found += 1;
            if found == wanted {
                return child;
            }
        }
    }
    let mut created = parent;
    while found < wanted {
        created = create_step(rec, parent, fragment);
        found += 1;
    }
    created
}

/// Element addressed by the element steps of `path`, creating what is missing
pub fn locate_or_create(rec: &mut WriteRecord<'_>, node: NodeId, path: &Path) -> NodeId {
    let mut current = node;
    for fragment in path.element_fragments() {
        current = locate_or_create_step(rec, current, fragment);
    }
    current
}

/// Parent of the element addressed by `path`, creating what is missing
pub fn locate_or_create_parent(rec: &mut WriteRecord<'_>, node: NodeId, path: &Path) -> NodeId {
    let mut current = node;
    for fragment in path.parent_fragments().iter().filter(|f| f.is_element()) {
        current = locate_or_create_step(rec, current, fragment);
    }
    current
}

/// New element for the last element step of `path` (intermediate steps are
/// reused). Without element steps, `node` itself.
pub fn add_element(rec: &mut WriteRecord<'_>, node: NodeId, path: &Path) -> NodeId {
    let Some(last) = path.last_element() else {
        return node;
    };
    let parent = locate_or_create_parent(rec, node, path);
    create_step(rec, parent, last)
}

/// Write `path`'s terminal step (attribute or text) at an already located
/// element. Empty text adds no text node.
pub fn write_terminal(
    rec: &mut WriteRecord<'_>,
    element: NodeId,
    path: &Path,
    value: &str,
    cdata: bool,
) {
    match path.last() {
        Some(f) if f.is_attribute() => {
            rec.set_attribute(element, &f.qname(), f.preferred_prefix(), value);
        }
        _ if value.is_empty() => {}
        _ => {
            rec.tree_mut().append_text(element, value, cdata);
        }
    }
}

/// Write `value` at `path`, creating missing elements
pub fn put(rec: &mut WriteRecord<'_>, node: NodeId, path: &Path, value: &str, cdata: bool) {
    let element = locate_or_create(rec, node, path);
    write_terminal(rec, element, path, value, cdata);
}

/// Write `value` into a freshly added element for `path`
pub fn add(rec: &mut WriteRecord<'_>, node: NodeId, path: &Path, value: &str, cdata: bool) {
    let element = add_element(rec, node, path);
    write_terminal(rec, element, path, value, cdata);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NamespaceResolver, WriteOptions, XmlDocument, DOCUMENT_NODE};
    use crate::path::PathCache;
    use pretty_assertions::assert_eq;

    fn compile(expr: &str) -> Path {
        let mut ns = NamespaceResolver::new();
        ns.declare("e", "urn:e");
        Path::compile(expr, None, &ns, &PathCache::default()).unwrap()
    }

    const DOC: &str = r#"<emp xmlns:e="urn:e" id="7"><name>Ann</name><e:phone>1</e:phone><e:phone>2</e:phone><empty/></emp>"#;

    #[test]
    fn test_extract_distinguishes_absent_from_empty() {
        let doc = XmlDocument::parse(DOC).unwrap();
        let root = doc.root_element_id().unwrap();
        assert_eq!(extract(&doc, root, &compile("name/text()")).value(), Some("Ann"));
        assert_eq!(extract(&doc, root, &compile("@id")).value(), Some("7"));
        assert_eq!(extract(&doc, root, &compile("empty/text()")).value(), Some(""));
        assert_eq!(extract(&doc, root, &compile("missing/text()")), Lookup::NoEntry);
        assert_eq!(extract(&doc, root, &compile("@nope")), Lookup::NoEntry);
    }

    #[test]
    fn test_positional_and_select() {
        let doc = XmlDocument::parse(DOC).unwrap();
        let root = doc.root_element_id().unwrap();
        assert_eq!(extract(&doc, root, &compile("e:phone[2]/text()")).value(), Some("2"));
        assert_eq!(extract_all(&doc, root, &compile("e:phone/text()")), vec!["1", "2"]);
        assert_eq!(select(&doc, root, &compile("e:phone[1]")).len(), 1);
        assert_eq!(select(&doc, root, &compile("@id")), vec![root]);
    }

    #[test]
    fn test_put_creates_path_and_positional_siblings() {
        let mut doc = XmlDocument::new();
        {
            let mut rec = WriteRecord::new(&mut doc, DOCUMENT_NODE);
            let root = rec.create_child(DOCUMENT_NODE, None, "emp", "");
            put(&mut rec, root, &compile("@id"), "7", false);
            put(&mut rec, root, &compile("addr/city/text()"), "Oslo", false);
            put(&mut rec, root, &compile("addr/zip/text()"), "0150", false);
            put(&mut rec, root, &compile("e:phone[2]/text()"), "2", false);
        }
        assert_eq!(
            doc.to_xml_string(&WriteOptions::default()),
            r#"<emp id="7"><addr><city>Oslo</city><zip>0150</zip></addr><e:phone xmlns:e="urn:e"/><e:phone xmlns:e="urn:e">2</e:phone></emp>"#
        );
    }

    #[test]
    fn test_add_appends_new_elements() {
        let mut doc = XmlDocument::new();
        {
            let mut rec = WriteRecord::new(&mut doc, DOCUMENT_NODE);
            let root = rec.create_child(DOCUMENT_NODE, None, "list", "");
            let path = compile("items/item/text()");
            add(&mut rec, root, &path, "a", false);
            add(&mut rec, root, &path, "b", true);
        }
        assert_eq!(
            doc.to_xml_string(&WriteOptions::default()),
            "<list><items><item>a</item><item><![CDATA[b]]></item></items></list>"
        );
    }
}
