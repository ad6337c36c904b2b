//! Namespace Resolution
//!
//! Stack-based namespace resolver. Descriptors use a single scope as their
//! prefix table; the serializer pushes one scope per element to decide which
//! declarations are already in effect.

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
    pub const XOP: &str = "http://www.w3.org/2004/08/xop/include";
    pub const SWAREF: &str = "http://ws-i.org/profiles/basic/1.1/xsd";
}

/// Conventional prefixes for the namespaces above
pub mod prefix {
    pub const XSI: &str = "xsi";
    pub const XS: &str = "xs";
    pub const XOP: &str = "xop";
}

/// Namespace binding (prefix -> URI); the empty prefix is the default namespace
#[derive(Debug, Clone, PartialEq, Eq)]
struct NsBinding {
    prefix: String,
    uri: String,
    depth: u16,
}

/// Stack-based namespace resolver
#[derive(Debug, Clone)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<NsBinding>,
    /// Current element depth
    depth: u16,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceResolver {
    /// Create a new namespace resolver with the pre-declared `xml` prefix
    pub fn new() -> Self {
        NamespaceResolver {
            bindings: vec![NsBinding {
                prefix: "xml".to_string(),
                uri: ns::XML.to_string(),
                depth: 0,
            }],
            depth: 0,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth || binding.depth == 0 {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a namespace binding for the current scope
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        // Don't allow redeclaring xml or xmlns
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        let depth = self.depth;
        if let Some(existing) = self
            .bindings
            .iter_mut()
            .rev()
            .take_while(|b| b.depth == depth)
            .find(|b| b.prefix == prefix)
        {
            existing.uri = uri.to_string();
            return;
        }
        self.bindings.push(NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth,
        });
    }

    /// Declare the default namespace for current scope
    pub fn declare_default(&mut self, uri: &str) {
        self.declare("", uri);
    }

    /// Resolve a prefix to a namespace URI
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        // Search from most recent to oldest
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Resolve the default namespace
    pub fn resolve_default(&self) -> Option<&str> {
        self.resolve("")
    }

    /// Find a prefix currently bound to `uri`. Shadowed bindings are skipped.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter(|b| b.uri == uri)
            .map(|b| b.prefix.as_str())
            .find(|p| self.resolve(p) == Some(uri))
    }

    /// Produce a prefix of the form `nsN` that is not bound in any scope
    pub fn generate_prefix(&self) -> String {
        (0..)
            .map(|n| format!("ns{}", n))
            .find(|candidate| !self.bindings.iter().any(|b| &b.prefix == candidate))
            .unwrap_or_default()
    }

    /// Get current depth
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Get all active namespace bindings at current scope as (prefix, uri)
    pub fn active_bindings(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        // Return unique bindings (most recent for each prefix)
        let mut seen_prefixes = std::collections::HashSet::new();
        self.bindings.iter().rev().filter_map(move |b| {
            if b.prefix != "xml" && seen_prefixes.insert(b.prefix.as_str()) {
                Some((b.prefix.as_str(), b.uri.as_str()))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespaces() {
        let resolver = NamespaceResolver::new();
        assert_eq!(resolver.resolve("xml"), Some(ns::XML));
        assert_eq!(resolver.resolve_default(), None);
    }

    #[test]
    fn test_declare_and_resolve() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("svg", "http://www.w3.org/2000/svg");
        assert_eq!(resolver.resolve("svg"), Some("http://www.w3.org/2000/svg"));
        assert_eq!(resolver.prefix_for("http://www.w3.org/2000/svg"), Some("svg"));
    }

    #[test]
    fn test_scope_pop() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("foo", "http://example.com/foo");
        assert_eq!(resolver.resolve("foo"), Some("http://example.com/foo"));

        resolver.pop_scope();
        assert_eq!(resolver.resolve("foo"), None);
    }

    #[test]
    fn test_shadow_binding() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare("ns", "http://example.com/ns1");

        resolver.push_scope();
        resolver.declare("ns", "http://example.com/ns2");
        assert_eq!(resolver.resolve("ns"), Some("http://example.com/ns2"));
        assert_eq!(resolver.prefix_for("http://example.com/ns1"), None);

        resolver.pop_scope();
        assert_eq!(resolver.resolve("ns"), Some("http://example.com/ns1"));
    }

    #[test]
    fn test_undeclare_default() {
        let mut resolver = NamespaceResolver::new();
        resolver.declare_default("urn:a");
        resolver.push_scope();
        resolver.declare_default("");
        assert_eq!(resolver.resolve_default(), None);
    }

    #[test]
    fn test_generate_prefix() {
        let mut resolver = NamespaceResolver::new();
        assert_eq!(resolver.generate_prefix(), "ns0");
        resolver.declare("ns0", "urn:a");
        assert_eq!(resolver.generate_prefix(), "ns1");
    }
}
