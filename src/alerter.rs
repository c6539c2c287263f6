//! Proximity alerter (C8): great-circle distance, max-observed-distance
//! tracking, per-aircraft dedup, and notifier dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::warn;

use crate::enrichment::EnrichmentEngine;
use crate::kv_store::KvStore;
use crate::notifier::Notifier;

/// IUGG mean Earth radius in kilometers. See the distance-formula decision:
/// haversine with this radius, not a WGS-84 ellipsoidal geodesic, is what
/// produces the expected ~111.195 km for one degree of longitude at the
/// equator.
const EARTH_RADIUS_KM: f64 = 6371.0088;

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

pub struct Alerter {
    home_lat: f64,
    home_lon: f64,
    radius_km: f64,
    cooldown: Duration,
    store: Arc<dyn KvStore>,
    enrichment: Arc<EnrichmentEngine>,
    notifier: Arc<dyn Notifier>,
    max_observed_distance_km_bits: AtomicU64,
}

impl Alerter {
    pub fn new(
        home_lat: f64,
        home_lon: f64,
        radius_km: f64,
        store: Arc<dyn KvStore>,
        enrichment: Arc<EnrichmentEngine>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            home_lat,
            home_lon,
            radius_km,
            cooldown: DEFAULT_COOLDOWN,
            store,
            enrichment,
            notifier,
            max_observed_distance_km_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn max_observed_distance_km(&self) -> f64 {
        f64::from_bits(self.max_observed_distance_km_bits.load(Ordering::Relaxed))
    }

    /// Distance in km from home to `(lat, lon)`, updating the running
    /// maximum. Returns the distance for the caller to decide whether to
    /// attempt an alert.
    pub fn record_distance(&self, lat: f64, lon: f64) -> f64 {
        let distance = geodesic_distance_km(self.home_lat, self.home_lon, lat, lon);
        self.max_observed_distance_km_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let current = f64::from_bits(bits);
                if distance > current {
                    Some(distance.to_bits())
                } else {
                    None
                }
            })
            .ok();
        distance
    }

    /// Evaluate whether to fire an alert for `hex` given its current
    /// snapshot and a just-computed distance. No-op if the aircraft has no
    /// callsign, is outside the radius, or was already alerted within the
    /// cooldown window.
    pub async fn maybe_alert(&self, hex: &str, snapshot: &HashMap<String, String>, distance_km: f64) {
        if distance_km > self.radius_km {
            return;
        }

        let callsign = match snapshot.get("callsign").filter(|c| !c.is_empty()) {
            Some(c) => c.clone(),
            None => return,
        };

        let dedup_key = format!("alerted:{hex}");
        if self.store.exists(&dedup_key).await {
            return;
        }
        self.store
            .set(&dedup_key, "1".to_string(), Some(self.cooldown))
            .await;

        let record = self.enrichment.enrich(hex).await;
        let embed = build_embed(hex, distance_km, snapshot, &callsign, &record);

        if let Err(reason) = self
            .notifier
            .send("\u{2708}\u{fe0f} Nearby aircraft detected!", embed)
            .await
        {
            warn!(hex, reason, "notifier delivery failed; dedup key retained");
        }
    }
}

/// Great-circle distance in km via the haversine formula at the IUGG mean
/// Earth radius.
pub fn geodesic_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

fn build_embed(
    hex: &str,
    distance_km: f64,
    snapshot: &HashMap<String, String>,
    callsign: &str,
    record: &crate::enrichment::EnrichmentRecord,
) -> Value {
    let altitude = snapshot.get("altitude").cloned().unwrap_or_default();
    let registration = record
        .airplane
        .as_ref()
        .and_then(|a| a.get("registration_number"))
        .cloned()
        .unwrap_or_default();
    let aircraft_type = record
        .airplane
        .as_ref()
        .and_then(|a| a.get("iata_code_long"))
        .cloned()
        .unwrap_or_default();
    let airline_name = record
        .airline
        .as_ref()
        .and_then(|a| a.get("airline_name"))
        .cloned()
        .unwrap_or_default();
    let country_name = record
        .country
        .as_ref()
        .and_then(|c| c.get("country_name"))
        .cloned()
        .unwrap_or_default();
    let ground_speed = snapshot.get("ground_speed").cloned().unwrap_or_default();
    let latitude = snapshot.get("latitude").cloned().unwrap_or_default();
    let longitude = snapshot.get("longitude").cloned().unwrap_or_default();

    let mut embed = json!({
        "title": hex,
        "description": format!("Detected {distance_km:.1} km from base at {altitude} ft."),
        "color": 0x1abc9c,
        "fields": [
            {"name": "Flight", "value": callsign, "inline": true},
            {"name": "Registration", "value": registration, "inline": true},
            {"name": "Aircraft type", "value": aircraft_type, "inline": true},
            {"name": "Latitude", "value": latitude, "inline": true},
            {"name": "Longitude", "value": longitude, "inline": true},
            {"name": "Ground speed", "value": ground_speed, "inline": true},
            {"name": "Airline", "value": airline_name, "inline": true},
            {"name": "Country", "value": country_name, "inline": true},
        ],
    });

    if let Some(photo) = record.img.first() {
        if let Some(src) = photo
            .get("thumbnail_large")
            .and_then(|t| t.get("src"))
            .and_then(Value::as_str)
        {
            embed["image"] = json!({ "url": src });
        }
    }

    embed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_at_same_point_is_zero() {
        assert_eq!(geodesic_distance_km(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn distance_for_one_degree_longitude_at_equator_matches_expected_property() {
        let d = geodesic_distance_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.195).abs() < 0.1, "distance was {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = geodesic_distance_km(37.0, -122.0, 38.0, -121.0);
        let b = geodesic_distance_km(38.0, -121.0, 37.0, -122.0);
        assert!((a - b).abs() < 1e-9);
    }
}
