//! Detached element subtrees
//!
//! An `XmlElement` is an owned copy of a subtree, independent of any
//! document arena. Any mappings keep unknown content in this form and
//! fragment mappings expose it as an attribute value. Extraction declares
//! every namespace the subtree uses on its root so the copy stays
//! self-describing after it moves to another document.

use crate::qname::QName;

/// An attribute on a detached element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementAttribute {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local_name: String,
    pub value: String,
}

/// Child content of a detached element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementContent {
    Element(XmlElement),
    Text(String),
    CData(String),
}

/// Owned element subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local_name: String,
    pub attributes: Vec<ElementAttribute>,
    /// Namespace declarations as (prefix, uri); empty prefix is the default namespace
    pub namespace_decls: Vec<(String, String)>,
    pub children: Vec<ElementContent>,
}

impl XmlElement {
    pub fn new(namespace: Option<&str>, prefix: Option<&str>, local_name: &str) -> Self {
        XmlElement {
            namespace: namespace.filter(|n| !n.is_empty()).map(str::to_string),
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            local_name: local_name.to_string(),
            attributes: Vec::new(),
            namespace_decls: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn qname(&self) -> QName {
        QName::new(self.namespace.as_deref(), &self.local_name)
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, local_name: &str, value: &str) -> Self {
        self.attributes.push(ElementAttribute {
            namespace: None,
            prefix: None,
            local_name: local_name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Builder-style text child
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(ElementContent::Text(text.to_string()));
        self
    }

    /// Builder-style element child
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(ElementContent::Element(child));
        self
    }

    pub fn attribute(&self, namespace: Option<&str>, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.local_name == local_name && a.namespace.as_deref() == namespace)
            .map(|a| a.value.as_str())
    }

    /// Concatenated text of the direct text children
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let ElementContent::Text(t) | ElementContent::CData(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            ElementContent::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Prefixes used by this subtree that are not declared inside it,
    /// paired with their namespace URI.
    pub fn undeclared_prefixes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.collect_undeclared(&mut Vec::new(), &mut out);
        out
    }

    fn collect_undeclared(&self, scope: &mut Vec<String>, out: &mut Vec<(String, String)>) {
        let mark = scope.len();
        scope.extend(self.namespace_decls.iter().map(|(p, _)| p.clone()));

        let mut note = |prefix: Option<&String>, ns: Option<&String>, is_attr: bool| {
            let Some(uri) = ns else { return };
            // unprefixed attributes are never in a namespace
            if is_attr && prefix.is_none() {
                return;
            }
            let p = prefix.cloned().unwrap_or_default();
            if p == "xml" || scope.contains(&p) || out.iter().any(|(q, _)| *q == p) {
                return;
            }
            out.push((p, uri.clone()));
        };
        note(self.prefix.as_ref(), self.namespace.as_ref(), false);
        for attr in &self.attributes {
            note(attr.prefix.as_ref(), attr.namespace.as_ref(), true);
        }
        for child in self.child_elements() {
            child.collect_undeclared(scope, out);
        }
        scope.truncate(mark);
    }
}
