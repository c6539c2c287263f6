//! hexdb.io lookups (aircraft, airports, routes), all routed through the
//! cache-with-backoff so a flaky upstream only costs one round trip per
//! backoff window rather than one per message.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheBackoff, cache_key};

const BASE_URL: &str = "https://hexdb.io/api/v1";

#[derive(Clone)]
pub struct HexDbEnricher {
    client: Client,
    cache: CacheBackoff,
    base_url: String,
}

impl HexDbEnricher {
    pub fn new(client: Client, cache: CacheBackoff) -> Self {
        Self {
            client,
            cache,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Aircraft record by ICAO hex, returned as a JSON blob the caller
    /// merges into the enrichment record.
    pub async fn aircraft(&self, icao_hex: &str) -> Option<Value> {
        self.lookup("hexdb_aircraft", &[("hex", icao_hex)], &format!(
            "{}/aircraft/{icao_hex}",
            self.base_url
        ))
        .await
    }

    pub async fn airport_by_icao(&self, icao: &str) -> Option<Value> {
        self.lookup(
            "hexdb_airport_icao",
            &[("icao", icao)],
            &format!("{}/airport/icao/{icao}", self.base_url),
        )
        .await
    }

    pub async fn airport_by_iata(&self, iata: &str) -> Option<Value> {
        self.lookup(
            "hexdb_airport_iata",
            &[("iata", iata)],
            &format!("{}/airport/iata/{iata}", self.base_url),
        )
        .await
    }

    pub async fn route_by_icao_callsign(&self, callsign: &str) -> Option<Value> {
        self.lookup(
            "hexdb_route_icao",
            &[("callsign", callsign)],
            &format!("{}/route/icao/{callsign}", self.base_url),
        )
        .await
    }

    pub async fn route_by_iata_callsign(&self, callsign: &str) -> Option<Value> {
        self.lookup(
            "hexdb_route_iata",
            &[("callsign", callsign)],
            &format!("{}/route/iata/{callsign}", self.base_url),
        )
        .await
    }

    async fn lookup(&self, op: &str, args: &[(&str, &str)], url: &str) -> Option<Value> {
        let key = cache_key(op, args);
        let url = url.to_string();
        let client = self.client.clone();
        let result = self
            .cache
            .get_or_fetch(&key, move || async move { fetch(&client, &url).await })
            .await;

        match result {
            Ok(Some(body)) => serde_json::from_str(&body).ok(),
            Ok(None) => None,
            Err(reason) => {
                debug!(op, reason, "hexdb lookup unavailable");
                None
            }
        }
    }
}

async fn fetch(client: &Client, url: &str) -> Result<Option<String>, String> {
    let response = client
        .get(url)
        .send()
        .await
        .context("request to hexdb.io failed")
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!("rate limited by hexdb.io");
        return Err("rate limited".to_string());
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("hexdb.io error {status}: {body}"));
    }

    let body = response
        .text()
        .await
        .map_err(|e| anyhow!("reading hexdb.io response body: {e}").to_string())?;
    Ok(Some(body))
}
