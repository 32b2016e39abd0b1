//! Qualified names (Spec 7.1.7).
//!
//! Two qnames are equal when URI and local-name agree; the prefix is
//! carried along for fidelity but never part of the identity.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A qualified XML name.
#[derive(Debug, Clone)]
pub struct QName {
    /// Namespace URI, empty for no namespace.
    pub uri: Rc<str>,
    /// Local part.
    pub local_name: Rc<str>,
    /// Prefix as written, only meaningful when prefixes are preserved.
    pub prefix: Option<Rc<str>>,
}

impl QName {
    /// Creates a qname without prefix.
    pub fn new(uri: impl Into<Rc<str>>, local_name: impl Into<Rc<str>>) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
            prefix: None,
        }
    }

    /// Creates a qname with prefix.
    pub fn with_prefix(
        uri: impl Into<Rc<str>>,
        local_name: impl Into<Rc<str>>,
        prefix: impl Into<Rc<str>>,
    ) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
            prefix: Some(prefix.into()),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri && self.local_name == other.local_name
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
        self.local_name.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri
            .cmp(&other.uri)
            .then_with(|| self.local_name.cmp(&other.local_name))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.uri.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.uri, self.local_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(q: &QName) -> u64 {
        let mut h = DefaultHasher::new();
        q.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equality_ignores_prefix() {
        let a = QName::new("urn:x", "item");
        let b = QName::with_prefix("urn:x", "item", "x");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn distinct_uri_or_local_name() {
        let a = QName::new("urn:x", "item");
        assert_ne!(a, QName::new("urn:y", "item"));
        assert_ne!(a, QName::new("urn:x", "other"));
    }

    #[test]
    fn display_forms() {
        assert_eq!(QName::new("", "a").to_string(), "a");
        assert_eq!(QName::new("urn:x", "a").to_string(), "{urn:x}a");
    }

    #[test]
    fn ordering_by_uri_then_local_name() {
        let mut v = vec![
            QName::new("urn:b", "a"),
            QName::new("urn:a", "z"),
            QName::new("urn:a", "a"),
        ];
        v.sort();
        assert_eq!(v[0], QName::new("urn:a", "a"));
        assert_eq!(v[1], QName::new("urn:a", "z"));
        assert_eq!(v[2], QName::new("urn:b", "a"));
    }
}
