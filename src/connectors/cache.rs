// Connector result caching (SPEC_FULL.md §4.3 "Result caching (expansion)").
//
// LDAP/SQL connectors may be constructed with a `ResultCache`, keyed by a
// `sha2-256` fingerprint of the built request. Backed by `dashmap` for
// linearizable concurrent access; a reload constructs a fresh cache rather than
// clearing the old one in place (SPEC_FULL.md §5).

use std::collections::HashMap;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::model::Attribute;

/// A hex-encoded sha2-256 digest of a connector's built request (search filter,
/// SQL statement text, bind parameters). Shared by LDAP and SQL connectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheFingerprint(String);

impl CacheFingerprint {
    pub fn of(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Linearizable get/put over a connector's previously-resolved attribute maps.
pub trait ResultCache: Send + Sync {
    fn get_if_present(&self, fingerprint: &CacheFingerprint) -> Option<HashMap<String, Attribute>>;
    fn put(&self, fingerprint: CacheFingerprint, attributes: HashMap<String, Attribute>);
}

/// Default `ResultCache` backed by `dashmap::DashMap`.
#[derive(Debug, Default)]
pub struct DashMapResultCache {
    entries: DashMap<CacheFingerprint, HashMap<String, Attribute>>,
}

impl DashMapResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultCache for DashMapResultCache {
    fn get_if_present(&self, fingerprint: &CacheFingerprint) -> Option<HashMap<String, Attribute>> {
        self.entries.get(fingerprint).map(|entry| entry.clone())
    }

    fn put(&self, fingerprint: CacheFingerprint, attributes: HashMap<String, Attribute>) {
        self.entries.insert(fingerprint, attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeId;

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let a = CacheFingerprint::of(&["(uid=jdoe)", "base=dc=example,dc=org"]);
        let b = CacheFingerprint::of(&["(uid=jdoe)", "base=dc=example,dc=org"]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_inputs() {
        let a = CacheFingerprint::of(&["(uid=jdoe)"]);
        let b = CacheFingerprint::of(&["(uid=jsmith)"]);
        assert_ne!(a, b);
    }

    #[test]
    fn cache_roundtrips_through_dashmap() {
        let cache = DashMapResultCache::new();
        let fp = CacheFingerprint::of(&["q"]);
        assert!(cache.get_if_present(&fp).is_none());

        let mut attrs = HashMap::new();
        attrs.insert(
            "mail".to_string(),
            Attribute::new(AttributeId::new("mail").unwrap()),
        );
        cache.put(fp.clone(), attrs);
        assert!(cache.get_if_present(&fp).is_some());
    }
}
