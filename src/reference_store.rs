//! Read-only reference data adapter (C3) over four externally-owned
//! lookup tables: `airplanes`, `airlines`, `countries`, `icao_doc8643_2019`.
//!
//! These tables are populated and migrated by something outside this
//! process — the contract here is "read one row back", nothing more. Schema
//! is hand-declared with `diesel::table!` rather than generated from an
//! owned `schema.rs`, since this crate never runs a migration against them.
//! Mirrors the connection-pool-plus-repository shape of the aircraft
//! repository, minus any write path.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use tracing::warn;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

mod schema {
    diesel::table! {
        airplanes (icao_code_hex) {
            icao_code_hex -> Text,
            registration_number -> Nullable<Text>,
            iata_code_long -> Nullable<Text>,
            iata_code_short -> Nullable<Text>,
            iata_type -> Nullable<Text>,
            model_name -> Nullable<Text>,
            plane_owner -> Nullable<Text>,
            plane_status -> Nullable<Text>,
            engines_type -> Nullable<Text>,
            airline_iata_code -> Nullable<Text>,
            airline_icao_code -> Nullable<Text>,
        }
    }

    diesel::table! {
        airlines (iata_code) {
            iata_code -> Text,
            icao_code -> Nullable<Text>,
            airline_name -> Nullable<Text>,
            country_iso2 -> Nullable<Text>,
            status -> Nullable<Text>,
        }
    }

    diesel::table! {
        countries (country_iso2) {
            country_iso2 -> Text,
            country_name -> Nullable<Text>,
            continent -> Nullable<Text>,
        }
    }

    diesel::table! {
        icao_doc8643_2019 (designator) {
            designator -> Text,
            description_code -> Nullable<Text>,
            aircraft_description -> Nullable<Text>,
            wake_turbulence_category -> Nullable<Text>,
            manufacturer_code -> Nullable<Text>,
        }
    }
}

/// Every row of every table is surfaced as a flat string map: callers only
/// ever read a handful of named fields out of it, and the table shapes are
/// owned elsewhere, so there is no benefit to a typed struct per table.
pub type Row = HashMap<String, String>;

#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn airplane_by_hex(&self, icao_hex: &str) -> Result<Option<Row>>;
    async fn airline_by_iata(&self, iata: &str) -> Result<Option<Row>>;
    async fn country_by_iso2(&self, iso2: &str) -> Result<Option<Row>>;
    async fn icao_type_by_designator(&self, designator: &str) -> Result<Option<Row>>;
}

fn opt(v: Option<String>) -> String {
    v.unwrap_or_default()
}

/// Diesel/Postgres-backed implementation. Never issues writes or
/// migrations: the four tables are assumed to already exist and be kept
/// current by another process.
pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> Result<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("failed to get reference store connection: {e}"))
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn airplane_by_hex(&self, icao_hex: &str) -> Result<Option<Row>> {
        use schema::airplanes::dsl;
        let mut conn = self.get_connection()?;
        let key = icao_hex.to_string();
        let rows: Vec<(
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        )> = dsl::airplanes
            .filter(dsl::icao_code_hex.eq(&key))
            .select((
                dsl::icao_code_hex,
                dsl::registration_number,
                dsl::iata_code_long,
                dsl::iata_code_short,
                dsl::iata_type,
                dsl::model_name,
                dsl::plane_owner,
                dsl::plane_status,
                dsl::engines_type,
                dsl::airline_iata_code,
                dsl::airline_icao_code,
            ))
            .load(&mut conn)?;

        warn_on_multiplicity("airplanes", &key, rows.len());

        Ok(rows.into_iter().next().map(|r| {
            let mut row = Row::new();
            row.insert("icao_code_hex".into(), r.0);
            row.insert("registration_number".into(), opt(r.1));
            row.insert("iata_code_long".into(), opt(r.2));
            row.insert("iata_code_short".into(), opt(r.3));
            row.insert("iata_type".into(), opt(r.4));
            row.insert("model_name".into(), opt(r.5));
            row.insert("plane_owner".into(), opt(r.6));
            row.insert("plane_status".into(), opt(r.7));
            row.insert("engines_type".into(), opt(r.8));
            row.insert("airline_iata_code".into(), opt(r.9));
            row.insert("airline_icao_code".into(), opt(r.10));
            row
        }))
    }

    async fn airline_by_iata(&self, iata: &str) -> Result<Option<Row>> {
        use schema::airlines::dsl;
        let mut conn = self.get_connection()?;
        let key = iata.to_string();
        let rows: Vec<(String, Option<String>, Option<String>, Option<String>, Option<String>)> =
            dsl::airlines
                .filter(dsl::iata_code.eq(&key).and(dsl::status.eq("active")))
                .select((
                    dsl::iata_code,
                    dsl::icao_code,
                    dsl::airline_name,
                    dsl::country_iso2,
                    dsl::status,
                ))
                .load(&mut conn)?;

        warn_on_multiplicity("airlines", &key, rows.len());

        Ok(rows.into_iter().next().map(|r| {
            let mut row = Row::new();
            row.insert("iata_code".into(), r.0);
            row.insert("icao_code".into(), opt(r.1));
            row.insert("airline_name".into(), opt(r.2));
            row.insert("country_iso2".into(), opt(r.3));
            row.insert("status".into(), opt(r.4));
            row
        }))
    }

    async fn country_by_iso2(&self, iso2: &str) -> Result<Option<Row>> {
        use schema::countries::dsl;
        let mut conn = self.get_connection()?;
        let key = iso2.to_string();
        let rows: Vec<(String, Option<String>, Option<String>)> = dsl::countries
            .filter(dsl::country_iso2.eq(&key))
            .select((dsl::country_iso2, dsl::country_name, dsl::continent))
            .load(&mut conn)?;

        warn_on_multiplicity("countries", &key, rows.len());

        Ok(rows.into_iter().next().map(|r| {
            let mut row = Row::new();
            row.insert("country_iso2".into(), r.0);
            row.insert("country_name".into(), opt(r.1));
            row.insert("continent".into(), opt(r.2));
            row
        }))
    }

    async fn icao_type_by_designator(&self, designator: &str) -> Result<Option<Row>> {
        use schema::icao_doc8643_2019::dsl;
        let mut conn = self.get_connection()?;
        let key = designator.to_string();
        let rows: Vec<(String, Option<String>, Option<String>, Option<String>, Option<String>)> =
            dsl::icao_doc8643_2019
                .filter(dsl::designator.eq(&key))
                .select((
                    dsl::designator,
                    dsl::description_code,
                    dsl::aircraft_description,
                    dsl::wake_turbulence_category,
                    dsl::manufacturer_code,
                ))
                .load(&mut conn)?;

        warn_on_multiplicity("icao_doc8643_2019", &key, rows.len());

        Ok(rows.into_iter().next().map(|r| {
            let mut row = Row::new();
            row.insert("designator".into(), r.0);
            row.insert("description_code".into(), opt(r.1));
            row.insert("aircraft_description".into(), opt(r.2));
            row.insert("wake_turbulence_category".into(), opt(r.3));
            row.insert("manufacturer_code".into(), opt(r.4));
            row
        }))
    }
}

fn warn_on_multiplicity(table: &str, key: &str, count: usize) {
    if count > 1 {
        warn!(
            table,
            key, count, "reference table returned multiple rows for a single key; using the first"
        );
    }
}

/// In-memory test double satisfying the same contract, for tests that don't
/// want a live Postgres instance.
#[cfg(test)]
pub struct FakeReferenceStore {
    pub airplanes: HashMap<String, Row>,
    pub airlines: HashMap<String, Row>,
    pub countries: HashMap<String, Row>,
    pub icao_types: HashMap<String, Row>,
}

#[cfg(test)]
#[async_trait]
impl ReferenceStore for FakeReferenceStore {
    async fn airplane_by_hex(&self, icao_hex: &str) -> Result<Option<Row>> {
        Ok(self.airplanes.get(icao_hex).cloned())
    }

    async fn airline_by_iata(&self, iata: &str) -> Result<Option<Row>> {
        Ok(self.airlines.get(iata).cloned())
    }

    async fn country_by_iso2(&self, iso2: &str) -> Result<Option<Row>> {
        Ok(self.countries.get(iso2).cloned())
    }

    async fn icao_type_by_designator(&self, designator: &str) -> Result<Option<Row>> {
        Ok(self.icao_types.get(designator).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FakeReferenceStore {
        let mut airplanes = HashMap::new();
        let mut row = Row::new();
        row.insert("icao_code_hex".into(), "A12F52".into());
        row.insert("airline_iata_code".into(), "WN".into());
        airplanes.insert("A12F52".into(), row);

        FakeReferenceStore {
            airplanes,
            airlines: HashMap::new(),
            countries: HashMap::new(),
            icao_types: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn airplane_lookup_returns_row_on_hit() {
        let s = store();
        let row = s.airplane_by_hex("A12F52").await.unwrap().unwrap();
        assert_eq!(row.get("airline_iata_code"), Some(&"WN".to_string()));
    }

    #[tokio::test]
    async fn airplane_lookup_returns_none_on_miss() {
        let s = store();
        assert_eq!(s.airplane_by_hex("000000").await.unwrap(), None);
    }
}
