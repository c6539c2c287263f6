//! Enrichment engine (C5): composes the reference store (C3) and the remote
//! enricher clients (C2) into one structured [`EnrichmentRecord`] per
//! aircraft. Runs only on the alert path — never on every message — so
//! remote call volume tracks alert volume, not message volume.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashSet;
use serde_json::Value;
use tracing::debug;

use crate::enrichers::{HexDbEnricher, PlanespottersEnricher};
use crate::reference_store::{ReferenceStore, Row};

#[derive(Debug, Clone, Default)]
pub struct EnrichmentRecord {
    pub airplane: Option<Row>,
    pub airline: Option<Row>,
    pub country: Option<Row>,
    pub img: Vec<Value>,
    pub svg: Option<String>,
}

pub struct EnrichmentEngine {
    reference: Arc<dyn ReferenceStore>,
    hexdb: HexDbEnricher,
    planespotters: PlanespottersEnricher,
    missing_hex: DashSet<String>,
}

impl EnrichmentEngine {
    pub fn new(
        reference: Arc<dyn ReferenceStore>,
        hexdb: HexDbEnricher,
        planespotters: PlanespottersEnricher,
    ) -> Self {
        Self {
            reference,
            hexdb,
            planespotters,
            missing_hex: DashSet::new(),
        }
    }

    /// Hex idents for which both the local store and the remote lookup
    /// missed, sorted for stable display in the monitor task.
    pub fn missing_hex_sorted(&self) -> Vec<String> {
        let mut v: Vec<String> = self.missing_hex.iter().map(|e| e.clone()).collect();
        v.sort();
        v
    }

    pub async fn enrich(&self, hex_ident: &str) -> EnrichmentRecord {
        let hex = hex_ident.trim().to_uppercase();
        let mut record = EnrichmentRecord::default();

        record.airplane = self.lookup_airplane(&hex).await;

        if let Some(airplane) = &record.airplane {
            if let Some(iata) = non_empty(airplane.get("airline_iata_code")) {
                record.airline = self
                    .reference
                    .airline_by_iata(&iata.trim().to_uppercase())
                    .await
                    .unwrap_or(None);
            }
        }

        if let Some(airline) = &record.airline {
            if let Some(iso2) = non_empty(airline.get("country_iso2")) {
                record.country = self
                    .reference
                    .country_by_iso2(&iso2.trim().to_uppercase())
                    .await
                    .unwrap_or(None);
            }
        }

        record.img = self
            .planespotters
            .photos(&hex)
            .await
            .into_iter()
            .filter_map(|p| serde_json::to_value(p).ok())
            .collect();

        if let Some(airplane) = &record.airplane {
            record.svg = self.marker_for(airplane).await;
        }

        record
    }

    async fn lookup_airplane(&self, hex: &str) -> Option<Row> {
        if let Ok(Some(row)) = self.reference.airplane_by_hex(hex).await {
            return Some(row);
        }

        if let Some(remote) = self.hexdb.aircraft(hex).await {
            return Some(remap_hexdb_aircraft(&remote));
        }

        debug!(hex, "airplane lookup missed both local store and remote");
        self.missing_hex.insert(hex.to_string());
        None
    }

    async fn marker_for(&self, airplane: &Row) -> Option<String> {
        let designator = non_empty(airplane.get("iata_code_long"))?
            .trim()
            .to_uppercase();

        let icao_type = self
            .reference
            .icao_type_by_designator(&designator)
            .await
            .ok()??;

        Some(pick_marker(
            &designator,
            icao_type.get("description_code").map(String::as_str).unwrap_or(""),
            icao_type
                .get("aircraft_description")
                .map(String::as_str)
                .unwrap_or(""),
            icao_type
                .get("wake_turbulence_category")
                .map(String::as_str)
                .unwrap_or(""),
        ))
    }
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.filter(|s| !s.is_empty()).cloned()
}

/// Remap a raw hexdb.io aircraft payload into this crate's reference-store
/// row shape so downstream code never has to branch on which source
/// answered the lookup.
fn remap_hexdb_aircraft(raw: &Value) -> Row {
    let mut row = HashMap::new();
    let mut set = |dst: &str, src: &str| {
        if let Some(v) = raw.get(src).and_then(Value::as_str) {
            if !v.is_empty() {
                row.insert(dst.to_string(), v.to_string());
            }
        }
    };
    set("icao_code_hex", "ModeS");
    set("registration_number", "Registration");
    set("iata_code_long", "ICAOTypeCode");
    set("iata_type", "Type");
    set("plane_owner", "RegisteredOwners");
    // OperatorFlagCode carries the airline's flight-number prefix (e.g. "EZY"),
    // not an IATA code `airline_by_iata` can key on, so it's dropped rather
    // than remapped.
    row
}

/// Deterministic marker picker: stable hash of the identifying tuple so the
/// same aircraft type always renders the same marker, without needing an
/// explicit lookup table for every designator.
fn pick_marker(designator: &str, description_code: &str, aircraft_description: &str, wake: &str) -> String {
    const MARKERS: &[&str] = &[
        "airliner",
        "regional-jet",
        "turboprop",
        "helicopter",
        "light-aircraft",
        "business-jet",
    ];

    if wake.eq_ignore_ascii_case("H") || description_code.starts_with('H') {
        return "helicopter".to_string();
    }

    let mut hash: u64 = 1469598103934665603;
    for byte in designator
        .bytes()
        .chain(description_code.bytes())
        .chain(aircraft_description.bytes())
    {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    MARKERS[(hash as usize) % MARKERS.len()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helicopter_wake_category_always_picks_helicopter_marker() {
        assert_eq!(pick_marker("R44", "H", "Robinson R44", "H"), "helicopter");
    }

    #[test]
    fn marker_pick_is_deterministic_for_same_inputs() {
        let a = pick_marker("B738", "L2J", "737-800", "M");
        let b = pick_marker("B738", "L2J", "737-800", "M");
        assert_eq!(a, b);
    }

    #[test]
    fn remap_drops_empty_and_absent_hexdb_fields() {
        let raw = serde_json::json!({
            "ModeS": "A12F52",
            "Registration": "",
            "ICAOTypeCode": "B738",
        });
        let row = remap_hexdb_aircraft(&raw);
        assert_eq!(row.get("icao_code_hex"), Some(&"A12F52".to_string()));
        assert_eq!(row.get("iata_code_long"), Some(&"B738".to_string()));
        assert!(!row.contains_key("registration_number"));
        assert!(!row.contains_key("plane_owner"));
    }
}
