//! Configuration & CLI (C14): a `clap`-derived CLI layered over environment
//! variables, loaded via `dotenvy` before parsing, matching the rest of the
//! fleet's `clap::Parser` + `.env` convention.

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(name = "skywatch", about = "Real-time ADS-B ingestion, enrichment, and proximity alerting")]
pub struct Config {
    /// Host of the SBS-1 (BaseStation) decoder to connect to.
    #[arg(long, env = "SBS_HOST", default_value = "localhost")]
    pub sbs_host: String,

    /// Port of the SBS-1 decoder.
    #[arg(long, env = "SBS_PORT", default_value_t = 30003)]
    pub sbs_port: u16,

    /// Backlog queue capacity.
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 100)]
    pub queue_capacity: usize,

    /// Aggregator snapshot TTL, in seconds.
    #[arg(long, env = "AGGREGATE_TTL_SECONDS", default_value_t = 1800)]
    pub aggregate_ttl_seconds: u64,

    /// Alert radius, in kilometers.
    #[arg(long, env = "ALERT_RADIUS_KM", default_value_t = 50.0)]
    pub alert_radius_km: f64,

    /// Alert dedup cooldown, in seconds.
    #[arg(long, env = "ALERT_COOLDOWN_SECONDS", default_value_t = 600)]
    pub alert_cooldown_seconds: u64,

    /// Monitor task tick interval, in seconds.
    #[arg(long, env = "MONITOR_INTERVAL_SECONDS", default_value_t = 10)]
    pub monitor_interval_seconds: u64,

    /// Optional path to an append-only CSV archive log.
    #[arg(long, env = "CSV_LOG_PATH")]
    pub csv_log_path: Option<String>,

    /// Injected home latitude; if both this and `home_lon` are set, the
    /// location provider is never contacted.
    #[arg(long, env = "HOME_LAT")]
    pub home_lat: Option<f64>,

    /// Injected home longitude.
    #[arg(long, env = "HOME_LON")]
    pub home_lon: Option<f64>,

    /// gpsd host, used only if home coordinates aren't injected.
    #[arg(long, env = "GPSD_HOST", default_value = "localhost")]
    pub gpsd_host: String,

    /// gpsd port.
    #[arg(long, env = "GPSD_PORT", default_value_t = 2947)]
    pub gpsd_port: u16,

    /// Startup timeout waiting for the location provider, in seconds.
    #[arg(long, env = "LOCATION_STARTUP_TIMEOUT_SECONDS", default_value_t = 10)]
    pub location_startup_timeout_seconds: u64,

    /// PostgreSQL connection string for the reference store. If unset, the
    /// reference store degrades to always-absent rather than failing
    /// startup.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Discord webhook id; combined with `webhook_token`.
    #[arg(long, env = "WEBHOOK_ID")]
    pub webhook_id: Option<String>,

    /// Discord webhook token; combined with `webhook_id`.
    #[arg(long, env = "WEBHOOK_TOKEN")]
    pub webhook_token: Option<String>,

    /// Full Discord webhook URL; either this or `webhook_id`+`webhook_token`
    /// satisfies the notifier contract.
    #[arg(long, env = "DISCORD_WEBHOOK_URL")]
    pub discord_webhook_url: Option<String>,

    /// Generic bearer token accepted by one or more remote enrichers.
    #[arg(long, env = "API_TOKEN")]
    pub api_token: Option<String>,

    #[arg(long, env = "AIRLAB_API_TOKEN")]
    pub airlab_api_token: Option<String>,

    #[arg(long, env = "AVIATION_STACK_API_TOKEN")]
    pub aviation_stack_api_token: Option<String>,
}

impl Config {
    /// Load `.env` (if present) and parse CLI args/environment, matching
    /// the rest of the fleet's startup sequence.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Config::parse()
    }

    pub fn enricher_bearer_token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .or(self.airlab_api_token.as_deref())
            .or(self.aviation_stack_api_token.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_program_name_only() {
        let cfg = Config::parse_from(["skywatch"]);
        assert_eq!(cfg.sbs_host, "localhost");
        assert_eq!(cfg.sbs_port, 30003);
        assert_eq!(cfg.queue_capacity, 100);
        assert_eq!(cfg.alert_radius_km, 50.0);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::parse_from([
            "skywatch",
            "--sbs-host",
            "decoder.local",
            "--alert-radius-km",
            "25.5",
        ]);
        assert_eq!(cfg.sbs_host, "decoder.local");
        assert_eq!(cfg.alert_radius_km, 25.5);
    }

    #[test]
    fn enricher_bearer_token_falls_back_in_order() {
        let mut cfg = Config::parse_from(["skywatch"]);
        cfg.aviation_stack_api_token = Some("av-token".to_string());
        assert_eq!(cfg.enricher_bearer_token(), Some("av-token"));
        cfg.api_token = Some("generic-token".to_string());
        assert_eq!(cfg.enricher_bearer_token(), Some("generic-token"));
    }
}
