//! Cache-with-backoff (C1) sitting in front of every enrichment lookup.
//!
//! Two concerns are deliberately folded into one wrapper, mirroring the
//! analytics cache's key-enum-plus-TTL shape: a positive result cache (long
//! or unbounded TTL) and a negative result cache keyed separately so a
//! string of upstream failures doesn't retry on every message, only once per
//! backoff window.

use std::sync::Arc;
use std::time::Duration;

use crate::kv_store::KvStore;

const ERROR_PREFIX: &str = "error:";

/// Builds the canonical cache key for an `(operation, args)` pair: the
/// operation name, then each `key=value` pair in the order supplied,
/// comma-separated, with spaces mapped to underscores and any character
/// outside `[A-Za-z0-9:._-]` mapped to underscore. Declared explicitly
/// rather than derived by reflection so the key space stays obvious from a
/// log line.
pub fn cache_key(op: &str, args: &[(&str, &str)]) -> String {
    let mut key = String::from(op);
    key.push(':');
    let pairs: Vec<String> = args
        .iter()
        .map(|(k, v)| format!("{k}={}", sanitize(v)))
        .collect();
    key.push_str(&pairs.join(","));
    key
}

fn sanitize(v: &str) -> String {
    v.chars()
        .map(|c| {
            if c == ' ' {
                '_'
            } else if c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Cache-with-backoff wrapper around a [`KvStore`].
#[derive(Clone)]
pub struct CacheBackoff {
    store: Arc<dyn KvStore>,
    positive_ttl: Option<Duration>,
    error_ttl: Duration,
}

impl CacheBackoff {
    pub fn new(store: Arc<dyn KvStore>, positive_ttl: Option<Duration>, error_ttl: Duration) -> Self {
        Self {
            store,
            positive_ttl,
            error_ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.store.get(key).await
    }

    pub async fn get_error(&self, key: &str) -> Option<String> {
        self.store.get(&format!("{ERROR_PREFIX}{key}")).await
    }

    pub async fn put(&self, key: &str, value: String) {
        self.store.set(key, value, self.positive_ttl).await;
    }

    pub async fn put_error(&self, key: &str, reason: &str) {
        self.store
            .set(
                &format!("{ERROR_PREFIX}{key}"),
                reason.to_string(),
                Some(self.error_ttl),
            )
            .await;
    }

    /// Run the full contract: positive cache, then negative cache, then (on
    /// a double miss) invoke `f` and cache whichever outcome it returns.
    /// `f` is only invoked on a double miss, never to "refresh" a hit.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, f: F) -> Result<Option<String>, String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Option<String>, String>>,
    {
        if let Some(v) = self.get(key).await {
            return Ok(Some(v));
        }
        if let Some(reason) = self.get_error(key).await {
            return Err(reason);
        }
        match f().await {
            Ok(Some(v)) => {
                self.put(key, v.clone()).await;
                Ok(Some(v))
            }
            Ok(None) => Ok(None),
            Err(reason) => {
                self.put_error(key, &reason).await;
                Err(reason)
            }
        }
    }
}
