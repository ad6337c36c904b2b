//! Tree Record capability
//!
//! Mapping kinds never touch a concrete DOM. They read through a
//! [`ReadRecord`] and write through a [`WriteRecord`], both thin views of
//! "this node of some [`TreeRecord`]". [`XmlDocument`] is the arena-backed
//! implementation; anything tree-shaped can stand in for it.

use crate::dom::namespace::{ns, prefix};
use crate::dom::{NodeId, NodeKind, XmlDocument, XmlElement};
use crate::path::{self, Lookup, Path};
use crate::qname::{prefixed, split_prefixed, QName};

/// Borrowed view of one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRef<'a> {
    pub namespace: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub local_name: &'a str,
    pub value: &'a str,
}

/// Node-oriented access to a document tree. Prefix arguments use `""` for
/// "no prefix" / the default namespace.
pub trait TreeRecord {
    fn root_element(&self) -> Option<NodeId>;
    fn kind(&self, id: NodeId) -> Option<NodeKind>;
    fn local_name(&self, id: NodeId) -> Option<&str>;
    fn namespace_uri(&self, id: NodeId) -> Option<&str>;
    fn prefix(&self, id: NodeId) -> Option<&str>;
    fn parent(&self, id: NodeId) -> Option<NodeId>;
    fn children(&self, id: NodeId) -> Vec<NodeId>;
    /// Content of a text node
    fn text(&self, id: NodeId) -> Option<&str>;
    fn attributes(&self, id: NodeId) -> Vec<AttributeRef<'_>>;
    fn attribute(&self, id: NodeId, namespace: Option<&str>, local: &str) -> Option<&str>;
    /// Declarations made on `id` as (prefix, uri)
    fn namespace_declarations(&self, id: NodeId) -> Vec<(&str, &str)>;
    fn lookup_namespace_uri(&self, id: NodeId, prefix: &str) -> Option<&str>;
    fn lookup_prefix(&self, id: NodeId, uri: &str) -> Option<&str>;
    /// Owned, self-describing copy of an element subtree
    fn extract_element(&self, id: NodeId) -> XmlElement;

    fn create_element(
        &mut self,
        parent: NodeId,
        namespace: Option<&str>,
        local: &str,
        prefix: &str,
    ) -> NodeId;
    fn append_text(&mut self, parent: NodeId, text: &str, cdata: bool) -> NodeId;
    fn set_attribute(
        &mut self,
        id: NodeId,
        namespace: Option<&str>,
        local: &str,
        prefix: &str,
        value: &str,
    );
    fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str);
    /// A prefix not bound at `id`
    fn generate_prefix(&self, id: NodeId) -> String;
    fn import_element(&mut self, parent: NodeId, element: &XmlElement) -> NodeId;

    fn is_element(&self, id: NodeId) -> bool {
        self.kind(id) == Some(NodeKind::Element)
    }

    fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// Concatenated direct text children
    fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            if let Some(t) = self.text(child) {
                out.push_str(t);
            }
        }
        out
    }

    fn qname(&self, id: NodeId) -> Option<QName> {
        Some(QName::new(self.namespace_uri(id), self.local_name(id)?))
    }

    fn matches(&self, id: NodeId, namespace: Option<&str>, local: &str) -> bool {
        self.is_element(id)
            && self.local_name(id) == Some(local)
            && self.namespace_uri(id) == namespace.filter(|n| !n.is_empty())
    }
}

impl TreeRecord for XmlDocument {
    fn root_element(&self) -> Option<NodeId> {
        self.root_element_id()
    }

    fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    fn local_name(&self, id: NodeId) -> Option<&str> {
        XmlDocument::local_name(self, id)
    }

    fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        XmlDocument::namespace_uri(self, id)
    }

    fn prefix(&self, id: NodeId) -> Option<&str> {
        XmlDocument::prefix(self, id)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent_of(id)
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        XmlDocument::children(self, id).collect()
    }

    fn text(&self, id: NodeId) -> Option<&str> {
        self.text_content(id)
    }

    fn attributes(&self, id: NodeId) -> Vec<AttributeRef<'_>> {
        XmlDocument::attributes(self, id)
            .iter()
            .map(|a| AttributeRef {
                namespace: self.strings.get_opt(a.namespace_id),
                prefix: self.strings.get_opt(a.prefix_id),
                local_name: self.strings.get(a.name_id).unwrap_or(""),
                value: self.strings.get(a.value_id).unwrap_or(""),
            })
            .collect()
    }

    fn attribute(&self, id: NodeId, namespace: Option<&str>, local: &str) -> Option<&str> {
        XmlDocument::attribute(self, id, namespace, local)
    }

    fn namespace_declarations(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.namespace_decls(id)
            .iter()
            .map(|d| {
                (
                    self.strings.get(d.prefix_id).unwrap_or(""),
                    self.strings.get(d.uri_id).unwrap_or(""),
                )
            })
            .collect()
    }

    fn lookup_namespace_uri(&self, id: NodeId, prefix: &str) -> Option<&str> {
        XmlDocument::lookup_namespace_uri(self, id, prefix)
    }

    fn lookup_prefix(&self, id: NodeId, uri: &str) -> Option<&str> {
        XmlDocument::lookup_prefix(self, id, uri)
    }

    fn extract_element(&self, id: NodeId) -> XmlElement {
        XmlDocument::extract_element(self, id)
    }

    fn create_element(
        &mut self,
        parent: NodeId,
        namespace: Option<&str>,
        local: &str,
        prefix: &str,
    ) -> NodeId {
        XmlDocument::create_element(self, parent, namespace, local, prefix)
    }

    fn append_text(&mut self, parent: NodeId, text: &str, cdata: bool) -> NodeId {
        XmlDocument::append_text(self, parent, text, cdata)
    }

    fn set_attribute(
        &mut self,
        id: NodeId,
        namespace: Option<&str>,
        local: &str,
        prefix: &str,
        value: &str,
    ) {
        XmlDocument::set_attribute(self, id, namespace, local, prefix, value)
    }

    fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) {
        XmlDocument::declare_namespace(self, id, prefix, uri)
    }

    fn generate_prefix(&self, id: NodeId) -> String {
        XmlDocument::generate_prefix(self, id)
    }

    fn import_element(&mut self, parent: NodeId, element: &XmlElement) -> NodeId {
        XmlDocument::import_element(self, parent, element)
    }
}

/// Read view: one context node of a tree
#[derive(Clone, Copy)]
pub struct ReadRecord<'a> {
    tree: &'a dyn TreeRecord,
    node: NodeId,
}

impl<'a> ReadRecord<'a> {
    pub fn new(tree: &'a dyn TreeRecord, node: NodeId) -> Self {
        ReadRecord { tree, node }
    }

    pub fn tree(&self) -> &'a dyn TreeRecord {
        self.tree
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Record for another node of the same tree
    pub fn nested(&self, node: NodeId) -> ReadRecord<'a> {
        ReadRecord {
            tree: self.tree,
            node,
        }
    }

    /// Single value at `path`, distinguishing absence from emptiness
    pub fn get(&self, path: &Path) -> Lookup {
        path::extract(self.tree, self.node, path)
    }

    /// Elements addressed by the element part of `path`
    pub fn get_nodes(&self, path: &Path) -> Vec<NodeId> {
        path::select(self.tree, self.node, path)
    }

    /// One value per node addressed by `path`
    pub fn get_values(&self, path: &Path) -> Vec<String> {
        path::extract_all(self.tree, self.node, path)
    }

    /// Value of `path`'s terminal step at an element it selected
    pub fn value_at(&self, node: NodeId, path: &Path) -> Option<String> {
        path::value_at(self.tree, node, path)
    }

    pub fn resolve_prefix(&self, prefix: &str) -> Option<&'a str> {
        self.tree.lookup_namespace_uri(self.node, prefix)
    }

    /// Resolve a lexical `prefix:local` value against the in-scope namespaces
    /// of `node`; an unprefixed value takes the default namespace.
    pub fn resolve_qname(&self, node: NodeId, lexical: &str) -> Option<QName> {
        let (prefix, local) = split_prefixed(lexical.trim());
        let namespace = self.tree.lookup_namespace_uri(node, prefix.unwrap_or(""));
        if prefix.is_some() && namespace.is_none() {
            return None;
        }
        Some(QName::new(namespace, local))
    }

    /// `xsi:type` of `node`, resolved to a qualified name
    pub fn schema_type(&self, node: NodeId) -> Option<QName> {
        let lexical = self.tree.attribute(node, Some(ns::XSI), "type")?;
        self.resolve_qname(node, lexical)
    }

    /// `xsi:nil="true"` on `node`
    pub fn is_nil(&self, node: NodeId) -> bool {
        matches!(
            self.tree.attribute(node, Some(ns::XSI), "nil").map(str::trim),
            Some("true") | Some("1")
        )
    }
}

/// Write view: one context node of a mutable tree
pub struct WriteRecord<'a> {
    tree: &'a mut dyn TreeRecord,
    node: NodeId,
}

impl<'a> WriteRecord<'a> {
    pub fn new(tree: &'a mut dyn TreeRecord, node: NodeId) -> Self {
        WriteRecord { tree, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn tree(&self) -> &dyn TreeRecord {
        &*self.tree
    }

    pub fn tree_mut(&mut self) -> &mut dyn TreeRecord {
        &mut *self.tree
    }

    /// Record for another node of the same tree, reborrowing this one
    pub fn nested(&mut self, node: NodeId) -> WriteRecord<'_> {
        WriteRecord {
            tree: &mut *self.tree,
            node,
        }
    }

    /// Write a single value at `path`, creating missing elements
    pub fn put(&mut self, path: &Path, value: &str, cdata: bool) {
        let node = self.node;
        path::put(self, node, path, value, cdata);
    }

    /// Append a value at `path`: the last element step is always created anew
    pub fn add(&mut self, path: &Path, value: &str, cdata: bool) {
        let node = self.node;
        path::add(self, node, path, value, cdata);
    }

    /// Element addressed by `path`, created if missing
    pub fn create_nested(&mut self, path: &Path) -> NodeId {
        let node = self.node;
        path::locate_or_create(self, node, path)
    }

    /// New element for the last element step of `path`
    pub fn add_nested(&mut self, path: &Path) -> NodeId {
        let node = self.node;
        path::add_element(self, node, path)
    }

    /// Parent element of what `path` addresses, created if missing
    pub fn create_parent(&mut self, path: &Path) -> NodeId {
        let node = self.node;
        path::locate_or_create_parent(self, node, path)
    }

    /// Write `path`'s attribute or text at an element already located for it
    pub fn write_value(&mut self, node: NodeId, path: &Path, value: &str, cdata: bool) {
        path::write_terminal(self, node, path, value, cdata);
    }

    /// Prefix bound to `uri` in scope at `node`
    pub fn resolve_prefix(&self, node: NodeId, uri: &str) -> Option<String> {
        self.tree.lookup_prefix(node, uri).map(str::to_string)
    }

    pub fn generate_prefix(&self, node: NodeId) -> String {
        self.tree.generate_prefix(node)
    }

    /// Append an element, declaring its namespace on it unless `preferred` (or
    /// some other prefix) is already bound to that namespace in scope.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        namespace: Option<&str>,
        local: &str,
        preferred: &str,
    ) -> NodeId {
        let namespace = namespace.filter(|n| !n.is_empty());
        let Some(uri) = namespace else {
            let id = self.tree.create_element(parent, None, local, "");
            // an inherited default namespace has to be switched off
            if self.tree.lookup_namespace_uri(parent, "").is_some() {
                self.tree.declare_namespace(id, "", "");
            }
            return id;
        };
        if self.tree.lookup_namespace_uri(parent, preferred) == Some(uri) {
            return self.tree.create_element(parent, Some(uri), local, preferred);
        }
        if let Some(existing) = self.resolve_prefix(parent, uri) {
            return self.tree.create_element(parent, Some(uri), local, &existing);
        }
        let prefix = if self.tree.lookup_namespace_uri(parent, preferred).is_none() {
            preferred.to_string()
        } else {
            self.tree.generate_prefix(parent)
        };
        let id = self.tree.create_element(parent, Some(uri), local, &prefix);
        self.tree.declare_namespace(id, &prefix, uri);
        id
    }

    /// Prefix usable for a namespaced attribute (or QName value) at `node`,
    /// declaring one on `node` when nothing suitable is in scope.
    pub fn ensure_prefix(&mut self, node: NodeId, uri: &str, preferred: &str) -> String {
        if !preferred.is_empty() && self.tree.lookup_namespace_uri(node, preferred) == Some(uri) {
            return preferred.to_string();
        }
        if let Some(existing) = self.resolve_prefix(node, uri).filter(|p| !p.is_empty()) {
            return existing;
        }
        let prefix = if !preferred.is_empty() && self.tree.lookup_namespace_uri(node, preferred).is_none() {
            preferred.to_string()
        } else {
            self.tree.generate_prefix(node)
        };
        self.tree.declare_namespace(node, &prefix, uri);
        prefix
    }

    /// Set an attribute, binding a prefix for its namespace when needed
    pub fn set_attribute(&mut self, node: NodeId, name: &QName, preferred: &str, value: &str) {
        match name.namespace() {
            Some(uri) => {
                let prefix = self.ensure_prefix(node, uri, preferred);
                self.tree.set_attribute(node, Some(uri), &name.local, &prefix, value);
            }
            None => self.tree.set_attribute(node, None, &name.local, "", value),
        }
    }

    /// Lexical form of a QName value for use at `node`
    pub fn qname_text(&mut self, node: NodeId, name: &QName) -> String {
        match name.namespace() {
            Some(uri) => {
                if self.tree.lookup_namespace_uri(node, "") == Some(uri) {
                    return name.local.clone();
                }
                let prefix = self.ensure_prefix(node, uri, "");
                prefixed(&prefix, &name.local)
            }
            None => name.local.clone(),
        }
    }

    /// Write `xsi:type` on `node`
    pub fn set_schema_type(&mut self, node: NodeId, schema_type: &QName) {
        let value = self.qname_text(node, schema_type);
        self.set_attribute(node, &QName::new(Some(ns::XSI), "type"), prefix::XSI, &value);
    }

    /// Write `xsi:nil="true"` on `node`
    pub fn set_nil(&mut self, node: NodeId) {
        self.set_attribute(node, &QName::new(Some(ns::XSI), "nil"), prefix::XSI, "true");
    }
}
