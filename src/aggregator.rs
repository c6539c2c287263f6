//! Per-aircraft aggregator (C4): merges successive sparse SBS messages into
//! a coherent snapshot with a sliding time-to-live, backed by C10.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::kv_store::KvStore;
use crate::sbs::SbsMessage;

const TTL: Duration = Duration::from_secs(30 * 60);

pub struct Aggregator {
    store: Arc<dyn KvStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Merge a parsed message's non-empty fields into `aggregate:<hex>`,
    /// refreshing the TTL to 30 minutes regardless of which fields changed.
    pub async fn merge(&self, msg: &SbsMessage) {
        let key = format!("aggregate:{}", msg.hex_ident);
        let fields: HashMap<String, String> = msg
            .fields()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v.to_string())))
            .collect();

        if !fields.is_empty() {
            self.store.hset(&key, fields).await;
        }
        self.store.expire(&key, TTL).await;
    }

    /// Current merged snapshot for `hex`, or an empty map if nothing has
    /// been observed (or the TTL has lapsed).
    pub async fn snapshot(&self, hex: &str) -> HashMap<String, String> {
        self.store
            .hgetall(&format!("aggregate:{hex}"))
            .await
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::DashMapKvStore;
    use crate::sbs::parse_sbs_line;

    fn aggregator() -> Aggregator {
        Aggregator::new(Arc::new(DashMapKvStore::new()))
    }

    #[tokio::test]
    async fn merge_keeps_latest_non_empty_value_per_field() {
        let agg = aggregator();
        let pos = parse_sbs_line(
            "MSG,3,1,1,A12F52,1,2026/07/30,12:00:00.000,2026/07/30,12:00:00.000,,,,,\
37.0,-122.0,,,,,,0",
        )
        .unwrap();
        agg.merge(&pos).await;

        let ident = parse_sbs_line(
            "MSG,1,1,1,A12F52,1,2026/07/30,12:00:01.000,2026/07/30,12:00:01.000,SWA123,,\
,,,,,,,,0",
        )
        .unwrap();
        agg.merge(&ident).await;

        let snap = agg.snapshot("A12F52").await;
        assert_eq!(snap.get("latitude"), Some(&"37.0".to_string()));
        assert_eq!(snap.get("callsign"), Some(&"SWA123".to_string()));
    }

    #[tokio::test]
    async fn merge_never_writes_empty_strings() {
        let agg = aggregator();
        let msg = parse_sbs_line("MSG,1,1,1,A12F52,1,,,,,,,,,,,,,,,,0").unwrap();
        agg.merge(&msg).await;
        let snap = agg.snapshot("A12F52").await;
        assert!(snap.values().all(|v| !v.is_empty()));
    }

    #[tokio::test]
    async fn snapshot_is_empty_for_unknown_hex() {
        let agg = aggregator();
        assert!(agg.snapshot("000000").await.is_empty());
    }

    #[tokio::test]
    async fn later_merge_overwrites_earlier_value_for_same_field() {
        let agg = aggregator();
        let first = parse_sbs_line(
            "MSG,3,1,1,A12F52,1,,,,,,,,,\
37.0,-122.0,,,,,,0",
        )
        .unwrap();
        agg.merge(&first).await;
        let second = parse_sbs_line(
            "MSG,3,1,1,A12F52,1,,,,,,,,,\
38.0,-123.0,,,,,,0",
        )
        .unwrap();
        agg.merge(&second).await;

        let snap = agg.snapshot("A12F52").await;
        assert_eq!(snap.get("latitude"), Some(&"38.0".to_string()));
        assert_eq!(snap.get("longitude"), Some(&"-123.0".to_string()));
    }
}
