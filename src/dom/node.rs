//! XML Node representation
//!
//! Uses NodeId (u32) for compact node references into the document arena.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// The document node always sits at index 0
pub const DOCUMENT_NODE: NodeId = 0;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CData,
}

/// An XML node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for document root)
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node
    pub last_child: Option<NodeId>,
    /// Previous sibling
    pub prev_sibling: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// String id of the local name (elements) or the content (text nodes)
    pub name_id: u32,
    /// String id of the namespace prefix, or 0
    pub prefix_id: u32,
    /// String id of the namespace URI, or 0
    pub namespace_id: u32,
    /// Attributes (elements only)
    pub attributes: Vec<XmlAttribute>,
    /// Namespace declarations made on this element
    pub namespaces: Vec<NsDecl>,
}

impl XmlNode {
    fn with_kind(kind: NodeKind, parent: Option<NodeId>) -> Self {
        XmlNode {
            kind,
            parent,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            name_id: 0,
            prefix_id: 0,
            namespace_id: 0,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    /// Create a new document root node
    pub fn document() -> Self {
        Self::with_kind(NodeKind::Document, None)
    }

    /// Create a new element node
    pub fn element(name_id: u32, parent: Option<NodeId>) -> Self {
        let mut node = Self::with_kind(NodeKind::Element, parent);
        node.name_id = name_id;
        node
    }

    /// Create a new text node
    pub fn text(content_id: u32, parent: Option<NodeId>) -> Self {
        let mut node = Self::with_kind(NodeKind::Text, parent);
        node.name_id = content_id;
        node
    }

    /// Create a new CDATA node
    pub fn cdata(content_id: u32, parent: Option<NodeId>) -> Self {
        let mut node = Self::with_kind(NodeKind::CData, parent);
        node.name_id = content_id;
        node
    }

    /// Check if this is an element node
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Check if this is a text or CDATA node
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CData)
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

/// Stored attribute
#[derive(Debug, Clone)]
pub struct XmlAttribute {
    /// String id of the local name
    pub name_id: u32,
    /// String id of the namespace prefix
    pub prefix_id: u32,
    /// String id of the namespace URI
    pub namespace_id: u32,
    /// String id of the value
    pub value_id: u32,
}

/// Namespace declaration (`xmlns` or `xmlns:p`); prefix id 0 is the default namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsDecl {
    pub prefix_id: u32,
    pub uri_id: u32,
}
