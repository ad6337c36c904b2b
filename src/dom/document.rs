//! XML Document - Arena-based DOM representation
//!
//! Mutable DOM storage with:
//! - Arena allocation for nodes
//! - NodeId indices for traversal
//! - String interning for names, URIs and content
//!
//! Parsing is delegated to `roxmltree`; the parsed tree is copied into the
//! arena once so that mapping code can read and grow it through the same
//! node ids.

use super::element::{ElementAttribute, ElementContent, XmlElement};
use super::namespace::ns;
use super::node::{NodeId, NodeKind, NsDecl, XmlAttribute, XmlNode, DOCUMENT_NODE};
use super::strings::StringPool;
use crate::error::Result;

/// An XML document stored in arena format
#[derive(Debug, Clone)]
pub struct XmlDocument {
    /// Arena of nodes
    nodes: Vec<XmlNode>,
    /// Interned strings
    pub strings: StringPool,
    /// Root element node ID (not document node)
    root_element: Option<NodeId>,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Create an empty document holding only the document node
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(XmlNode::document());
        XmlDocument {
            nodes,
            strings: StringPool::new(),
            root_element: None,
        }
    }

    /// Parse an XML document from text
    pub fn parse(input: &str) -> Result<Self> {
        let parsed = roxmltree::Document::parse_with_options(
            input,
            roxmltree::ParsingOptions {
                allow_dtd: true,
                ..roxmltree::ParsingOptions::default()
            },
        )?;
        let mut doc = XmlDocument::new();
        for child in parsed.root().children() {
            if child.is_element() {
                doc.copy_parsed(DOCUMENT_NODE, child);
            }
        }
        Ok(doc)
    }

    /// Parse an XML document from bytes
    pub fn parse_bytes(input: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(input).map_err(|e| {
            crate::error::OxmError::conversion(&String::from_utf8_lossy(input), e)
        })?;
        Self::parse(text)
    }

    fn copy_parsed(&mut self, parent: NodeId, node: roxmltree::Node<'_, '_>) {
        if node.is_text() {
            if let Some(text) = node.text() {
                self.append_text(parent, text, false);
            }
            return;
        }
        if !node.is_element() {
            return;
        }

        let tag = node.tag_name();
        let prefix = tag
            .namespace()
            .and_then(|uri| element_prefix(node, uri))
            .unwrap_or("");
        let id = self.create_element(parent, tag.namespace(), tag.name(), prefix);

        // Declarations made on this element: in scope here but not on the parent
        let parent_ns: Vec<(Option<&str>, &str)> = node
            .parent_element()
            .map(|p| p.namespaces().map(|n| (n.name(), n.uri())).collect())
            .unwrap_or_default();
        for decl in node.namespaces() {
            if decl.uri() == ns::XML || parent_ns.contains(&(decl.name(), decl.uri())) {
                continue;
            }
            self.declare_namespace(id, decl.name().unwrap_or(""), decl.uri());
        }

        for attr in node.attributes() {
            let prefix = attr
                .namespace()
                .and_then(|uri| attribute_prefix(node, uri))
                .unwrap_or("");
            self.set_attribute(id, attr.namespace(), attr.name(), prefix, attr.value());
        }

        for child in node.children() {
            self.copy_parsed(id, child);
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Get root element ID
    pub fn root_element_id(&self) -> Option<NodeId> {
        self.root_element
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut XmlNode> {
        self.nodes.get_mut(id as usize)
    }

    /// Get total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Local name of an element
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.is_element() {
            self.strings.get(node.name_id)
        } else {
            None
        }
    }

    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.strings.get_opt(self.get_node(id)?.namespace_id)
    }

    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        self.strings.get_opt(self.get_node(id)?.prefix_id)
    }

    /// Content of a text or CDATA node
    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.is_text() {
            self.strings.get(node.name_id)
        } else {
            None
        }
    }

    /// Concatenated text of an element's direct text children
    pub fn element_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            if let Some(text) = self.text_content(child) {
                out.push_str(text);
            }
        }
        out
    }

    /// Attributes of an element
    pub fn attributes(&self, id: NodeId) -> &[XmlAttribute] {
        self.get_node(id)
            .map(|n| n.attributes.as_slice())
            .unwrap_or(&[])
    }

    /// Namespace declarations made on an element
    pub fn namespace_decls(&self, id: NodeId) -> &[NsDecl] {
        self.get_node(id)
            .map(|n| n.namespaces.as_slice())
            .unwrap_or(&[])
    }

    /// Attribute value by namespace and local name
    pub fn attribute(&self, id: NodeId, namespace: Option<&str>, local: &str) -> Option<&str> {
        let namespace = namespace.filter(|n| !n.is_empty());
        self.attributes(id)
            .iter()
            .find(|a| {
                self.strings.get(a.name_id) == Some(local)
                    && self.strings.get_opt(a.namespace_id) == namespace
            })
            .and_then(|a| self.strings.get(a.value_id))
    }

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        let first = self.get_node(id).and_then(|n| n.first_child);
        ChildIter { doc: self, next: first }
    }

    /// Iterate over element children of a node
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .filter(move |&c| self.get_node(c).map(|n| n.is_element()).unwrap_or(false))
    }

    /// Iterate over all descendants of a node
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        if let Some(node) = self.get_node(id) {
            let mut child_id = node.last_child;
            while let Some(cid) = child_id {
                stack.push(cid);
                child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
            }
        }
        DescendantIter { doc: self, stack }
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    /// Resolve a prefix ("" for the default namespace) in scope at `id`
    pub fn lookup_namespace_uri(&self, id: NodeId, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        let prefix_id = self.strings.find(prefix)?;
        let mut current = Some(id);
        while let Some(cid) = current {
            let node = self.get_node(cid)?;
            if let Some(decl) = node.namespaces.iter().find(|d| d.prefix_id == prefix_id) {
                return self.strings.get_opt(decl.uri_id);
            }
            current = node.parent;
        }
        None
    }

    /// Find a prefix bound to `uri` in scope at `id` ("" when it is the default namespace)
    pub fn lookup_prefix(&self, id: NodeId, uri: &str) -> Option<&str> {
        if uri == ns::XML {
            return Some("xml");
        }
        let uri_id = self.strings.find(uri)?;
        let mut current = Some(id);
        while let Some(cid) = current {
            let node = self.get_node(cid)?;
            for decl in node.namespaces.iter().filter(|d| d.uri_id == uri_id) {
                let prefix = self.strings.get(decl.prefix_id)?;
                // skip bindings shadowed closer to `id`
                if self.lookup_namespace_uri(id, prefix) == Some(uri) {
                    return Some(prefix);
                }
            }
            current = node.parent;
        }
        None
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn link_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        let last = self.get_node(parent_id).and_then(|p| p.last_child);
        if let Some(last_id) = last {
            if let Some(last_node) = self.node_mut(last_id) {
                last_node.next_sibling = Some(child_id);
            }
            if let Some(child) = self.node_mut(child_id) {
                child.prev_sibling = Some(last_id);
            }
        }
        if let Some(parent) = self.node_mut(parent_id) {
            if parent.first_child.is_none() {
                parent.first_child = Some(child_id);
            }
            parent.last_child = Some(child_id);
        }
    }

    fn push_node(&mut self, parent: NodeId, node: XmlNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        self.link_child(parent, id);
        id
    }

    /// Append a new element under `parent`. The first element appended to the
    /// document node becomes the root element.
    pub fn create_element(
        &mut self,
        parent: NodeId,
        namespace: Option<&str>,
        local: &str,
        prefix: &str,
    ) -> NodeId {
        let name_id = self.strings.intern(local);
        let mut node = XmlNode::element(name_id, Some(parent));
        node.namespace_id = self.strings.intern(namespace.unwrap_or(""));
        node.prefix_id = self.strings.intern(prefix);
        let id = self.push_node(parent, node);
        if parent == DOCUMENT_NODE && self.root_element.is_none() {
            self.root_element = Some(id);
        }
        id
    }

    /// Append a text (or CDATA) node under `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str, cdata: bool) -> NodeId {
        let content_id = self.strings.intern(text);
        let node = if cdata {
            XmlNode::cdata(content_id, Some(parent))
        } else {
            XmlNode::text(content_id, Some(parent))
        };
        self.push_node(parent, node)
    }

    /// Set (or replace) an attribute
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        namespace: Option<&str>,
        local: &str,
        prefix: &str,
        value: &str,
    ) {
        let attr = XmlAttribute {
            name_id: self.strings.intern(local),
            prefix_id: self.strings.intern(prefix),
            namespace_id: self.strings.intern(namespace.unwrap_or("")),
            value_id: self.strings.intern(value),
        };
        if let Some(node) = self.node_mut(id) {
            if let Some(existing) = node
                .attributes
                .iter_mut()
                .find(|a| a.name_id == attr.name_id && a.namespace_id == attr.namespace_id)
            {
                *existing = attr;
            } else {
                node.attributes.push(attr);
            }
        }
    }

    /// Declare a namespace on an element; an empty prefix declares the default namespace
    pub fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) {
        let decl = NsDecl {
            prefix_id: self.strings.intern(prefix),
            uri_id: self.strings.intern(uri),
        };
        if let Some(node) = self.node_mut(id) {
            node.namespaces.retain(|d| d.prefix_id != decl.prefix_id);
            node.namespaces.push(decl);
        }
    }

    /// Produce an `nsN` prefix that is unbound at `id` and everywhere above it
    pub fn generate_prefix(&self, id: NodeId) -> String {
        (0..)
            .map(|n| format!("ns{}", n))
            .find(|p| self.lookup_namespace_uri(id, p).is_none())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Detached subtrees
    // ------------------------------------------------------------------

    /// Copy an element subtree out of the arena. Namespaces used by the subtree
    /// but declared above it are re-declared on the copy's root.
    pub fn extract_element(&self, id: NodeId) -> XmlElement {
        let mut element = self.copy_element(id);
        for (prefix, uri) in element.undeclared_prefixes() {
            element.namespace_decls.push((prefix, uri));
        }
        element
    }

    fn copy_element(&self, id: NodeId) -> XmlElement {
        let mut element = XmlElement::new(
            self.namespace_uri(id),
            self.prefix(id),
            self.local_name(id).unwrap_or(""),
        );
        for decl in self.namespace_decls(id) {
            element.namespace_decls.push((
                self.strings.get(decl.prefix_id).unwrap_or("").to_string(),
                self.strings.get(decl.uri_id).unwrap_or("").to_string(),
            ));
        }
        for attr in self.attributes(id) {
            element.attributes.push(ElementAttribute {
                namespace: self.strings.get_opt(attr.namespace_id).map(str::to_string),
                prefix: self.strings.get_opt(attr.prefix_id).map(str::to_string),
                local_name: self.strings.get(attr.name_id).unwrap_or("").to_string(),
                value: self.strings.get(attr.value_id).unwrap_or("").to_string(),
            });
        }
        for child in self.children(id) {
            let Some(node) = self.get_node(child) else {
                continue;
            };
            let text = || self.strings.get(node.name_id).unwrap_or("").to_string();
            match node.kind {
                NodeKind::Element => element
                    .children
                    .push(ElementContent::Element(self.copy_element(child))),
                NodeKind::Text => element.children.push(ElementContent::Text(text())),
                NodeKind::CData => element.children.push(ElementContent::CData(text())),
                NodeKind::Document => {}
            }
        }
        element
    }

    /// Append a detached subtree under `parent`. Declarations already in effect
    /// at `parent` are not repeated.
    pub fn import_element(&mut self, parent: NodeId, element: &XmlElement) -> NodeId {
        let id = self.create_element(
            parent,
            element.namespace.as_deref(),
            &element.local_name,
            element.prefix.as_deref().unwrap_or(""),
        );
        for (prefix, uri) in &element.namespace_decls {
            if self.lookup_namespace_uri(parent, prefix) != Some(uri.as_str()) {
                self.declare_namespace(id, prefix, uri);
            }
        }
        // an unqualified element must not inherit the parent's default namespace
        let undeclares_default = element.namespace_decls.iter().any(|(p, _)| p.is_empty());
        if element.namespace.is_none() && !undeclares_default && self.lookup_namespace_uri(parent, "").is_some() {
            self.declare_namespace(id, "", "");
        }
        for attr in &element.attributes {
            self.set_attribute(
                id,
                attr.namespace.as_deref(),
                &attr.local_name,
                attr.prefix.as_deref().unwrap_or(""),
                &attr.value,
            );
        }
        for child in &element.children {
            match child {
                ElementContent::Element(e) => {
                    self.import_element(id, e);
                }
                ElementContent::Text(t) => {
                    self.append_text(id, t, false);
                }
                ElementContent::CData(t) => {
                    self.append_text(id, t, true);
                }
            }
        }
        id
    }
}

/// Prefix used for an element's own namespace, preferring a binding declared on it
fn element_prefix<'a, 'input>(node: roxmltree::Node<'a, 'input>, uri: &str) -> Option<&'input str> {
    let mut fallback = None;
    for decl in node.namespaces() {
        if decl.uri() == uri {
            match decl.name() {
                None => return None,
                Some(p) if fallback.is_none() => fallback = Some(p),
                Some(_) => {}
            }
        }
    }
    fallback
}

/// Namespaced attributes always carry a prefix, never the default binding
fn attribute_prefix<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    uri: &str,
) -> Option<&'input str> {
    node.namespaces()
        .filter(|decl| decl.uri() == uri)
        .find_map(|decl| decl.name())
}

/// Iterator over child nodes
pub struct ChildIter<'a> {
    doc: &'a XmlDocument,
    next: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator over descendant nodes in document order
pub struct DescendantIter<'a> {
    doc: &'a XmlDocument,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if let Some(node) = self.doc.get_node(current) {
            let mut child_id = node.last_child;
            while let Some(id) = child_id {
                self.stack.push(id);
                child_id = self.doc.get_node(id).and_then(|n| n.prev_sibling);
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let doc = XmlDocument::parse("<root><child>text</child></root>").unwrap();
        let root = doc.root_element_id().unwrap();
        assert_eq!(doc.local_name(root), Some("root"));
        let child = doc.element_children(root).next().unwrap();
        assert_eq!(doc.local_name(child), Some("child"));
        assert_eq!(doc.element_text(child), "text");
    }

    #[test]
    fn test_parse_namespaces() {
        let doc = XmlDocument::parse(
            r#"<a:root xmlns:a="urn:a" xmlns="urn:d"><item a:k="v"/></a:root>"#,
        )
        .unwrap();
        let root = doc.root_element_id().unwrap();
        assert_eq!(doc.namespace_uri(root), Some("urn:a"));
        assert_eq!(doc.prefix(root), Some("a"));
        let item = doc.element_children(root).next().unwrap();
        assert_eq!(doc.namespace_uri(item), Some("urn:d"));
        assert_eq!(doc.prefix(item), None);
        assert_eq!(doc.attribute(item, Some("urn:a"), "k"), Some("v"));
        assert_eq!(doc.namespace_decls(item).len(), 0);
        assert_eq!(doc.lookup_namespace_uri(item, "a"), Some("urn:a"));
        assert_eq!(doc.lookup_prefix(item, "urn:d"), Some(""));
    }

    #[test]
    fn test_parse_error() {
        assert!(XmlDocument::parse("<root>").is_err());
    }

    #[test]
    fn test_build_tree() {
        let mut doc = XmlDocument::new();
        let root = doc.create_element(DOCUMENT_NODE, None, "root", "");
        let a = doc.create_element(root, None, "a", "");
        doc.append_text(a, "1", false);
        doc.set_attribute(a, None, "k", "", "x");
        doc.set_attribute(a, None, "k", "", "y");
        assert_eq!(doc.root_element_id(), Some(root));
        assert_eq!(doc.attribute(a, None, "k"), Some("y"));
        assert_eq!(doc.attributes(a).len(), 1);
        assert_eq!(doc.descendants(root).count(), 2);
    }

    #[test]
    fn test_generate_prefix_skips_bound() {
        let mut doc = XmlDocument::new();
        let root = doc.create_element(DOCUMENT_NODE, None, "root", "");
        doc.declare_namespace(root, "ns0", "urn:a");
        let child = doc.create_element(root, None, "c", "");
        assert_eq!(doc.generate_prefix(child), "ns1");
    }

    #[test]
    fn test_extract_requalifies() {
        let doc = XmlDocument::parse(
            r#"<root xmlns:x="urn:x"><x:extra a="1"><x:y>t</x:y></x:extra></root>"#,
        )
        .unwrap();
        let root = doc.root_element_id().unwrap();
        let extra = doc.element_children(root).next().unwrap();
        let element = doc.extract_element(extra);
        assert_eq!(
            element.namespace_decls,
            vec![("x".to_string(), "urn:x".to_string())]
        );

        let mut target = XmlDocument::new();
        let new_root = target.create_element(DOCUMENT_NODE, None, "other", "");
        let imported = target.import_element(new_root, &element);
        assert_eq!(target.namespace_uri(imported), Some("urn:x"));
        assert_eq!(target.lookup_namespace_uri(imported, "x"), Some("urn:x"));
        assert_eq!(target.extract_element(imported), element);
    }

    #[test]
    fn test_import_unqualified_under_default_namespace() {
        let element = XmlElement::new(None, None, "plain").with_child(XmlElement::new(None, None, "c"));
        let mut doc = XmlDocument::new();
        let root = doc.create_element(DOCUMENT_NODE, Some("urn:d"), "root", "");
        doc.declare_namespace(root, "", "urn:d");
        doc.import_element(root, &element);
        let xml = doc.to_xml_string(&crate::dom::WriteOptions::default());
        assert_eq!(xml, r#"<root xmlns="urn:d"><plain xmlns=""><c/></plain></root>"#);

        let back = XmlDocument::parse(&xml).unwrap();
        let plain = back.element_children(back.root_element_id().unwrap()).next().unwrap();
        assert_eq!(back.namespace_uri(plain), None);
        assert_eq!(back.extract_element(plain).child_elements().count(), 1);
    }
}
