//! DOM Module - Arena-based XML Document
//!
//! Implements a mutable DOM representation using:
//! - Arena allocation for nodes
//! - NodeId (u32) indices for cache-friendly traversal
//! - String interning for names, URIs and content
//! - Scoped namespace resolution

pub mod document;
pub mod element;
pub mod namespace;
pub mod node;
pub mod strings;
pub mod writer;

pub use document::XmlDocument;
pub use element::{ElementAttribute, ElementContent, XmlElement};
pub use namespace::NamespaceResolver;
pub use node::{NodeId, NodeKind, XmlAttribute, XmlNode, DOCUMENT_NODE};
pub use strings::StringPool;
pub use writer::WriteOptions;
