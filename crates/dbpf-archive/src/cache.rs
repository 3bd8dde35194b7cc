//! Per-archive resource cache
//!
//! Holds decoded payloads so repeated lookups hand back the same object,
//! and staged payloads or raw bytes waiting for the next rewrite. Nothing is
//! evicted while the archive stays open.

use dbpf_formats::{Payload, ResourceKey};
use std::collections::HashMap;

#[derive(Debug)]
struct CachedPayload {
    payload: Payload,
    staged: bool,
}

/// Cached view of one resource
#[derive(Debug, Clone, Copy)]
pub enum CachedRef<'a> {
    /// Decoded payload
    Payload(&'a Payload),
    /// Staged raw bytes
    Raw(&'a [u8]),
}

/// Payload and staged-byte cache keyed by resource identity
#[derive(Debug, Default)]
pub struct ResourceCache {
    payloads: HashMap<ResourceKey, CachedPayload>,
    raw: HashMap<ResourceKey, Vec<u8>>,
}

impl ResourceCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached payload or staged bytes for `key`
    pub fn get(&self, key: &ResourceKey) -> Option<CachedRef<'_>> {
        if let Some(raw) = self.raw.get(key) {
            return Some(CachedRef::Raw(raw));
        }
        self.payloads
            .get(key)
            .map(|cached| CachedRef::Payload(&cached.payload))
    }

    /// Cached payload for `key`
    pub fn payload(&self, key: &ResourceKey) -> Option<&Payload> {
        self.payloads.get(key).map(|cached| &cached.payload)
    }

    /// Mutable cached payload for `key`
    pub fn payload_mut(&mut self, key: &ResourceKey) -> Option<&mut Payload> {
        self.payloads.get_mut(key).map(|cached| &mut cached.payload)
    }

    /// Staged raw bytes for `key`
    pub fn raw(&self, key: &ResourceKey) -> Option<&[u8]> {
        self.raw.get(key).map(Vec::as_slice)
    }

    /// Cache a decoded payload without staging it
    pub fn put(&mut self, key: ResourceKey, payload: Payload) {
        self.raw.remove(&key);
        self.payloads.insert(
            key,
            CachedPayload {
                payload,
                staged: false,
            },
        );
    }

    /// Mark a cached payload for re-encoding on the next rewrite
    pub fn stage(&mut self, key: &ResourceKey) -> bool {
        match self.payloads.get_mut(key) {
            Some(cached) => {
                cached.staged = true;
                true
            }
            None => false,
        }
    }

    /// Stage raw bytes, replacing any cached payload
    pub fn put_raw(&mut self, key: ResourceKey, bytes: Vec<u8>) {
        self.payloads.remove(&key);
        self.raw.insert(key, bytes);
    }

    /// Whether anything is cached for `key`
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.payloads.contains_key(key) || self.raw.contains_key(key)
    }

    /// Whether `key` holds a payload staged for re-encoding
    pub fn is_staged_payload(&self, key: &ResourceKey) -> bool {
        self.payloads.get(key).is_some_and(|cached| cached.staged)
    }

    /// Whether `key` holds staged raw bytes
    pub fn is_staged_raw(&self, key: &ResourceKey) -> bool {
        self.raw.contains_key(key)
    }

    /// Whether anything is staged
    pub fn has_staged(&self) -> bool {
        !self.raw.is_empty() || self.payloads.values().any(|cached| cached.staged)
    }

    /// Drop whatever is cached for `key`
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        let payload = self.payloads.remove(key).is_some();
        let raw = self.raw.remove(key).is_some();
        payload || raw
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.payloads.len() + self.raw.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty() && self.raw.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use dbpf_formats::resource::PropertySet;
    use dbpf_formats::types;

    fn key() -> ResourceKey {
        ResourceKey::new(types::GZPS, 1, 2, 0)
    }

    #[test]
    fn test_put_then_stage() {
        let mut cache = ResourceCache::new();
        assert!(!cache.stage(&key()));

        cache.put(key(), PropertySet::new(key()).into());
        assert!(cache.contains(&key()));
        assert!(!cache.is_staged_payload(&key()));
        assert!(!cache.has_staged());

        assert!(cache.stage(&key()));
        assert!(cache.is_staged_payload(&key()));
        assert!(matches!(cache.get(&key()), Some(CachedRef::Payload(_))));
    }

    #[test]
    fn test_raw_replaces_payload() {
        let mut cache = ResourceCache::new();
        cache.put(key(), PropertySet::new(key()).into());
        cache.put_raw(key(), vec![1, 2, 3]);

        assert!(cache.payload(&key()).is_none());
        assert!(cache.is_staged_raw(&key()));
        assert_eq!(cache.raw(&key()), Some(&[1u8, 2, 3][..]));
        assert_eq!(cache.len(), 1);

        assert!(cache.remove(&key()));
        assert!(cache.is_empty());
        assert!(!cache.remove(&key()));
    }
}
