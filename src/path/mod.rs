//! Path Model
//!
//! Compiled field addresses. A path expression such as `e:phone[2]/@type`
//! is tokenized ([`lexer`]), parsed into steps ([`parser`], cached by
//! [`cache`]) and then bound against the owning descriptor's namespace
//! table into [`Fragment`]s. Binding happens once, during descriptor
//! initialization; evaluation ([`eval`]) never looks at prefixes again.

pub mod cache;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::sync::Arc;

use crate::dom::{NamespaceResolver, NodeId};
use crate::error::{OxmError, Result};
use crate::qname::{split_prefixed, QName};

pub use cache::PathCache;
pub use eval::{
    add, add_element, extract, extract_all, locate, locate_or_create, locate_or_create_parent, put,
    select, value_at, write_terminal,
};
pub use parser::StepKind;

/// One compiled location step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: StepKind,
    pub local_name: String,
    /// Prefix as written, kept as the preferred prefix when writing
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    /// 1-based positional predicate
    pub position: Option<usize>,
    /// Schema type used for the node when no `xsi:type` is present
    pub leaf_type: Option<QName>,
}

impl Fragment {
    pub fn is_attribute(&self) -> bool {
        self.kind == StepKind::Attribute
    }

    pub fn is_text(&self) -> bool {
        self.kind == StepKind::Text
    }

    pub fn is_self(&self) -> bool {
        self.kind == StepKind::SelfNode
    }

    pub fn is_element(&self) -> bool {
        self.kind == StepKind::Element
    }

    pub fn qname(&self) -> QName {
        QName::new(self.namespace.as_deref(), &self.local_name)
    }

    pub fn preferred_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

/// A compiled, immutable field address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    expr: String,
    fragments: Arc<[Fragment]>,
}

impl Path {
    /// Compile `expr` against the namespace table of the owning descriptor.
    ///
    /// Unprefixed element steps take the default namespace; unprefixed
    /// attributes are in no namespace. `leaf_type` is a lexical
    /// `prefix:local` schema type name attached to the last element step.
    pub fn compile(
        expr: &str,
        leaf_type: Option<&str>,
        namespaces: &NamespaceResolver,
        cache: &PathCache,
    ) -> Result<Path> {
        let steps = cache.parse(expr)?;
        let unresolved = |prefix: &str| OxmError::UnresolvedPrefix {
            prefix: prefix.to_string(),
            path: expr.to_string(),
        };

        let mut fragments = Vec::with_capacity(steps.len());
        for step in steps.iter() {
            let namespace = match (step.kind, step.prefix.as_deref()) {
                (StepKind::Text | StepKind::SelfNode, _) => None,
                (_, Some(prefix)) => Some(
                    namespaces
                        .resolve(prefix)
                        .ok_or_else(|| unresolved(prefix))?
                        .to_string(),
                ),
                (StepKind::Element, None) => namespaces.resolve_default().map(str::to_string),
                (StepKind::Attribute, None) => None,
            };
            fragments.push(Fragment {
                kind: step.kind,
                local_name: step.local.clone(),
                prefix: step.prefix.clone(),
                namespace,
                position: step.position,
                leaf_type: None,
            });
        }

        if let Some(lexical) = leaf_type {
            let (prefix, local) = split_prefixed(lexical);
            let namespace = match prefix {
                Some(p) => Some(namespaces.resolve(p).ok_or_else(|| unresolved(p))?),
                None => namespaces.resolve_default(),
            };
            let target = fragments
                .iter_mut()
                .rev()
                .find(|f| f.is_element() || f.is_self());
            if let Some(fragment) = target {
                fragment.leaf_type = Some(QName::new(namespace, local));
            }
        }

        Ok(Path {
            expr: expr.to_string(),
            fragments: fragments.into(),
        })
    }

    /// The `.` path: the context node itself
    pub fn self_path() -> Path {
        Path {
            expr: ".".to_string(),
            fragments: Arc::from(vec![Fragment {
                kind: StepKind::SelfNode,
                local_name: ".".to_string(),
                prefix: None,
                namespace: None,
                position: None,
                leaf_type: None,
            }]),
        }
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// True until the path has been compiled
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn last(&self) -> Option<&Fragment> {
        self.fragments.last()
    }

    /// Element steps, in order
    pub fn element_fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter().filter(|f| f.is_element())
    }

    pub fn first_element(&self) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.is_element())
    }

    pub fn last_element(&self) -> Option<&Fragment> {
        self.fragments.iter().rev().find(|f| f.is_element())
    }

    /// Element steps leading up to (not including) the last element step
    pub fn parent_fragments(&self) -> &[Fragment] {
        match self.fragments.iter().rposition(|f| f.is_element()) {
            Some(i) => &self.fragments[..i],
            None => &[],
        }
    }

    /// Ends in `@attr`
    pub fn is_attribute(&self) -> bool {
        self.last().map(Fragment::is_attribute).unwrap_or(false)
    }

    /// Ends in `text()`
    pub fn is_text(&self) -> bool {
        self.last().map(Fragment::is_text).unwrap_or(false)
    }

    /// Addresses the context node itself
    pub fn is_self(&self) -> bool {
        self.fragments.len() == 1 && self.fragments[0].is_self()
    }

    /// Leaf type hint of the addressed element
    pub fn leaf_type(&self) -> Option<&QName> {
        self.fragments.iter().rev().find_map(|f| f.leaf_type.as_ref())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

/// Result of a single-value lookup. `NoEntry` (node absent) is distinct
/// from a node that is present with empty content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    NoEntry,
    /// `node` is the element that holds the value (the owner for attributes)
    Found { node: NodeId, value: String },
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found { .. })
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Lookup::Found { value, .. } => Some(value),
            Lookup::NoEntry => None,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Lookup::Found { node, .. } => Some(*node),
            Lookup::NoEntry => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::namespace::ns;

    fn resolver() -> NamespaceResolver {
        let mut r = NamespaceResolver::new();
        r.declare("e", "urn:emp");
        r.declare("xsd", ns::XS);
        r
    }

    #[test]
    fn test_compile_binds_namespaces() {
        let cache = PathCache::default();
        let path = Path::compile("e:phone[2]/@e:type", None, &resolver(), &cache).unwrap();
        let frags = path.fragments();
        assert_eq!(frags[0].namespace.as_deref(), Some("urn:emp"));
        assert_eq!(frags[0].position, Some(2));
        assert!(frags[1].is_attribute());
        assert_eq!(frags[1].namespace.as_deref(), Some("urn:emp"));
        assert!(path.is_attribute());
    }

    #[test]
    fn test_default_namespace_elements_only() {
        let mut r = NamespaceResolver::new();
        r.declare_default("urn:d");
        let cache = PathCache::default();
        let path = Path::compile("name/@lang", None, &r, &cache).unwrap();
        assert_eq!(path.fragments()[0].namespace.as_deref(), Some("urn:d"));
        assert_eq!(path.fragments()[1].namespace, None);
    }

    #[test]
    fn test_unresolved_prefix_fails_compile() {
        let cache = PathCache::default();
        let err = Path::compile("x:name/text()", None, &resolver(), &cache).unwrap_err();
        assert!(matches!(err, OxmError::UnresolvedPrefix { ref prefix, .. } if prefix == "x"));
    }

    #[test]
    fn test_leaf_type_on_last_element() {
        let cache = PathCache::default();
        let path = Path::compile("a/b", Some("xsd:int"), &resolver(), &cache).unwrap();
        assert_eq!(path.leaf_type(), Some(&QName::new(Some(ns::XS), "int")));
        assert_eq!(path.fragments()[0].leaf_type, None);
        assert_eq!(path.parent_fragments().len(), 1);
        assert_eq!(path.last_element().map(|f| f.local_name.as_str()), Some("b"));
    }

    #[test]
    fn test_self_path() {
        let path = Path::self_path();
        assert!(path.is_self());
        assert!(path.first_element().is_none());
        assert!(path.parent_fragments().is_empty());
    }
}
