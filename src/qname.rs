//! Qualified names

use std::fmt;

/// A namespace-qualified name. Two names are equal when their namespace URI
/// and local part match; prefixes are presentation only and are not stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        QName {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.to_string(),
        }
    }

    /// A name in no namespace
    pub fn local(local: &str) -> Self {
        QName::new(None, local)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.local == local && self.namespace() == namespace.filter(|ns| !ns.is_empty())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Split a lexical `prefix:local` name. The prefix is `None` when absent.
pub fn split_prefixed(name: &str) -> (Option<&str>, &str) {
    match memchr::memchr(b':', name.as_bytes()) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// Join a prefix and a local name into lexical form.
pub fn prefixed(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_prefixed() {
        assert_eq!(split_prefixed("xsi:type"), (Some("xsi"), "type"));
        assert_eq!(split_prefixed("name"), (None, "name"));
    }

    #[test]
    fn test_empty_namespace_is_none() {
        let a = QName::new(Some(""), "a");
        assert_eq!(a, QName::local("a"));
        assert!(a.matches(None, "a"));
        assert!(a.matches(Some(""), "a"));
    }

    #[test]
    fn test_display() {
        assert_eq!(QName::new(Some("urn:x"), "a").to_string(), "{urn:x}a");
        assert_eq!(QName::local("a").to_string(), "a");
    }
}
