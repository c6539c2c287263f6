//! In-process key/value store (C10) backing both the cache-with-backoff
//! (C1) and the per-aircraft aggregator (C4).
//!
//! The reference store and this store are treated as externally-owned
//! collaborators whose lifecycle (provisioning, persistence, clustering) is
//! out of scope; what's in scope is their contract. This gives that contract
//! a concrete body: a `DashMap`-backed map with per-key optional absolute
//! expiry, lazily reaped on read. Nothing here survives a restart, which
//! matches the aggregator's own "no persistence beyond its TTL" stance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// Minimal async key/value contract the cache and aggregator are built
/// against. An in-memory implementation is provided here; a Redis-backed one
/// would satisfy the same trait without either caller noticing.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>);
    async fn exists(&self, key: &str) -> bool;
    async fn expire(&self, key: &str, ttl: Duration);

    /// Merge `fields` into the hash stored at `key`, leaving other existing
    /// fields untouched.
    async fn hset(&self, key: &str, fields: HashMap<String, String>);
    async fn hgetall(&self, key: &str) -> Option<HashMap<String, String>>;
}

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// `DashMap`-backed implementation of [`KvStore`]. Strings and hashes share
/// one namespace, matching a real KV store where `GET` and `HGETALL` address
/// the same keyspace by convention rather than by type.
pub struct DashMapKvStore {
    strings: DashMap<String, Entry<String>>,
    hashes: DashMap<String, Entry<HashMap<String, String>>>,
}

impl DashMapKvStore {
    pub fn new() -> Self {
        Self {
            strings: DashMap::new(),
            hashes: DashMap::new(),
        }
    }

    fn deadline(ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|d| Instant::now() + d)
    }
}

impl Default for DashMapKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for DashMapKvStore {
    async fn get(&self, key: &str) -> Option<String> {
        let hit = self.strings.get(key)?;
        if hit.is_expired() {
            drop(hit);
            self.strings.remove(key);
            return None;
        }
        Some(hit.value.clone())
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        self.strings.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Self::deadline(ttl),
            },
        );
    }

    async fn exists(&self, key: &str) -> bool {
        if let Some(hit) = self.strings.get(key) {
            if hit.is_expired() {
                drop(hit);
                self.strings.remove(key);
                return false;
            }
            return true;
        }
        if let Some(hit) = self.hashes.get(key) {
            if hit.is_expired() {
                drop(hit);
                self.hashes.remove(key);
                return false;
            }
            return true;
        }
        false
    }

    async fn expire(&self, key: &str, ttl: Duration) {
        let deadline = Self::deadline(Some(ttl));
        if let Some(mut e) = self.strings.get_mut(key) {
            e.expires_at = deadline;
        }
        if let Some(mut e) = self.hashes.get_mut(key) {
            e.expires_at = deadline;
        }
    }

    async fn hset(&self, key: &str, fields: HashMap<String, String>) {
        self.hashes
            .entry(key.to_string())
            .and_modify(|e| {
                e.value.extend(fields.clone());
                e.expires_at = None;
            })
            .or_insert_with(|| Entry {
                value: fields,
                expires_at: None,
            });
    }

    async fn hgetall(&self, key: &str) -> Option<HashMap<String, String>> {
        let hit = self.hashes.get(key)?;
        if hit.is_expired() {
            drop(hit);
            self.hashes.remove(key);
            return None;
        }
        Some(hit.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = DashMapKvStore::new();
        store.set("foo", "bar".to_string(), None).await;
        assert_eq!(store.get("foo").await, Some("bar".to_string()));
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let store = DashMapKvStore::new();
        assert_eq!(store.get("missing").await, None);
    }

    #[tokio::test]
    async fn expired_entry_is_absent_and_removed() {
        let store = DashMapKvStore::new();
        store
            .set("foo", "bar".to_string(), Some(Duration::from_millis(1)))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("foo").await, None);
        assert!(!store.exists("foo").await);
    }

    #[tokio::test]
    async fn hset_merges_fields_without_clobbering_others() {
        let store = DashMapKvStore::new();
        let mut first = HashMap::new();
        first.insert("altitude".to_string(), "3500".to_string());
        store.hset("A12F52", first).await;

        let mut second = HashMap::new();
        second.insert("callsign".to_string(), "SWA123".to_string());
        store.hset("A12F52", second).await;

        let all = store.hgetall("A12F52").await.unwrap();
        assert_eq!(all.get("altitude"), Some(&"3500".to_string()));
        assert_eq!(all.get("callsign"), Some(&"SWA123".to_string()));
    }

    #[tokio::test]
    async fn expire_applies_to_hash_keys() {
        let store = DashMapKvStore::new();
        let mut fields = HashMap::new();
        fields.insert("altitude".to_string(), "3500".to_string());
        store.hset("A12F52", fields).await;
        store.expire("A12F52", Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.hgetall("A12F52").await, None);
    }
}
