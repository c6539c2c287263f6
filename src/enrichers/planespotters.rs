//! planespotters.net photo lookup, grounded on the images client's
//! rate-limit/status-code handling.

use std::sync::Arc;

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheBackoff, cache_key};

const BASE_URL: &str = "https://api.planespotters.net/pub/photos/hex";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    #[serde(rename = "thumbnail_large")]
    pub thumbnail_large: Option<PhotoSize>,
    pub link: Option<String>,
    pub photographer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSize {
    pub src: String,
}

#[derive(Debug, Deserialize)]
struct PhotosResponse {
    photos: Vec<Photo>,
}

#[derive(Clone)]
pub struct PlanespottersEnricher {
    client: Client,
    cache: CacheBackoff,
    base_url: String,
}

impl PlanespottersEnricher {
    pub fn new(client: Client, cache: CacheBackoff) -> Self {
        Self {
            client,
            cache,
            base_url: BASE_URL.to_string(),
        }
    }

    /// First photo (if any) for the given ICAO hex, or `None` on a miss or
    /// a backed-off upstream failure.
    pub async fn photos(&self, icao_hex: &str) -> Vec<Photo> {
        let key = cache_key("planespotters_photos", &[("hex", icao_hex)]);
        let url = format!("{}/{icao_hex}", self.base_url);
        let client = self.client.clone();
        let result = self
            .cache
            .get_or_fetch(&key, move || async move { fetch(&client, &url).await })
            .await;

        match result {
            Ok(Some(body)) => serde_json::from_str::<PhotosResponse>(&body)
                .map(|r| r.photos)
                .unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(reason) => {
                debug!(hex = icao_hex, reason, "planespotters lookup unavailable");
                Vec::new()
            }
        }
    }
}

async fn fetch(client: &Client, url: &str) -> Result<Option<String>, String> {
    let response = client
        .get(url)
        .send()
        .await
        .context("request to planespotters.net failed")
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!("rate limited by planespotters.net");
        return Err("rate limited".to_string());
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("planespotters.net error {status}: {body}"));
    }

    let body = response.text().await.map_err(|e| e.to_string())?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::DashMapKvStore;
    use std::time::Duration;

    #[test]
    fn parses_photos_response_shape() {
        let json = r#"{"photos":[{"thumbnail_large":{"src":"https://example.com/a.jpg"},"link":"https://example.com","photographer":"Jane"}]}"#;
        let parsed: PhotosResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.photos.len(), 1);
        assert_eq!(
            parsed.photos[0].thumbnail_large.as_ref().unwrap().src,
            "https://example.com/a.jpg"
        );
    }

    #[tokio::test]
    async fn enricher_constructs_without_panicking() {
        let store: Arc<dyn crate::kv_store::KvStore> = Arc::new(DashMapKvStore::new());
        let cache = CacheBackoff::new(store, None, Duration::from_secs(60));
        let client = crate::enrichers::http_client::build(None);
        let _enricher = PlanespottersEnricher::new(client, cache);
    }
}
