//! Supervisor (C9): owns every typed handle, orders startup, runs the
//! processor loop, and drives cooperative shutdown on SIGINT.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use tracing::{error, info};

use crate::aggregator::Aggregator;
use crate::alerter::Alerter;
use crate::cache::CacheBackoff;
use crate::config::Config;
use crate::consumer::Consumer;
use crate::csv_log::CsvLog;
use crate::enrichers::{HexDbEnricher, PlanespottersEnricher, http_client};
use crate::enrichment::EnrichmentEngine;
use crate::error::StartupError;
use crate::kv_store::{DashMapKvStore, KvStore};
use crate::location::{Coordinates, GpsdLocationProvider, LocationProvider};
use crate::metrics::{DropCounter, RateMeter};
use crate::notifier::{DiscordWebhookNotifier, NullNotifier, Notifier};
use crate::queue::BacklogQueue;
use crate::reference_store::{PgReferenceStore, ReferenceStore};
use crate::sbs::SbsMessage;

const POSITIVE_CACHE_ERROR_TTL: Duration = Duration::from_secs(30);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Reference store stand-in used when no `DATABASE_URL` is configured: every
/// query degrades to "absent" rather than failing startup, per the
/// configuration contract.
struct AbsentReferenceStore;

#[async_trait::async_trait]
impl ReferenceStore for AbsentReferenceStore {
    async fn airplane_by_hex(&self, _: &str) -> Result<Option<crate::reference_store::Row>> {
        Ok(None)
    }
    async fn airline_by_iata(&self, _: &str) -> Result<Option<crate::reference_store::Row>> {
        Ok(None)
    }
    async fn country_by_iso2(&self, _: &str) -> Result<Option<crate::reference_store::Row>> {
        Ok(None)
    }
    async fn icao_type_by_designator(&self, _: &str) -> Result<Option<crate::reference_store::Row>> {
        Ok(None)
    }
}

pub struct Supervisor {
    config: Config,
    running: Arc<AtomicBool>,
    queue: Arc<BacklogQueue<SbsMessage>>,
    kv_store: Arc<dyn KvStore>,
    aggregator: Arc<Aggregator>,
    alerter: Arc<Alerter>,
    csv_log: Option<Arc<CsvLog>>,
    produce_rate: Arc<RateMeter>,
    process_rate: Arc<RateMeter>,
    drops: Arc<DropCounter>,
    enrichment: Arc<EnrichmentEngine>,
    home: Coordinates,
}

impl Supervisor {
    pub async fn bootstrap(config: Config) -> Result<Self, StartupError> {
        let home = resolve_home(&config).await?;

        let csv_log = match &config.csv_log_path {
            Some(path) => Some(Arc::new(
                CsvLog::open(path).map_err(|e| StartupError::InvalidConfig(e.to_string()))?,
            )),
            None => None,
        };

        let reference: Arc<dyn ReferenceStore> = match &config.database_url {
            Some(url) => {
                let manager = ConnectionManager::<PgConnection>::new(url);
                let pool = Pool::builder()
                    .build(manager)
                    .map_err(|e| StartupError::InvalidConfig(format!("reference store pool: {e}")))?;
                Arc::new(PgReferenceStore::new(pool))
            }
            None => Arc::new(AbsentReferenceStore),
        };

        let kv_store: Arc<dyn KvStore> = Arc::new(DashMapKvStore::new());
        let http_client = http_client::build(config.enricher_bearer_token());

        let hexdb_cache = CacheBackoff::new(kv_store.clone(), None, POSITIVE_CACHE_ERROR_TTL);
        let photo_cache = CacheBackoff::new(
            kv_store.clone(),
            Some(Duration::from_secs(86_400)),
            POSITIVE_CACHE_ERROR_TTL,
        );
        let hexdb = HexDbEnricher::new(http_client.clone(), hexdb_cache);
        let planespotters = PlanespottersEnricher::new(http_client, photo_cache);
        let enrichment = Arc::new(EnrichmentEngine::new(reference, hexdb, planespotters));

        let notifier: Arc<dyn Notifier> = build_notifier(&config);

        let aggregator = Arc::new(Aggregator::new(kv_store.clone()));
        let alerter = Arc::new(
            Alerter::new(
                home.lat,
                home.lon,
                config.alert_radius_km,
                kv_store.clone(),
                enrichment.clone(),
                notifier,
            )
            .with_cooldown(Duration::from_secs(config.alert_cooldown_seconds)),
        );

        Ok(Self {
            queue: Arc::new(BacklogQueue::new(config.queue_capacity)),
            kv_store,
            aggregator,
            alerter,
            csv_log,
            produce_rate: Arc::new(RateMeter::new("msg_rate_produce")),
            process_rate: Arc::new(RateMeter::new("msg_rate_process")),
            drops: Arc::new(DropCounter::new()),
            enrichment,
            home,
            running: Arc::new(AtomicBool::new(true)),
            config,
        })
    }

    /// Runs the consumer task, the monitor task, and the processor loop
    /// until SIGINT, then drains cooperatively.
    pub async fn run(self) -> Result<()> {
        info!(lat = self.home.lat, lon = self.home.lon, "resolved home coordinates");

        let consumer = Consumer::new(
            self.config.sbs_host.clone(),
            self.config.sbs_port,
            self.queue.clone(),
            self.produce_rate.clone(),
            self.drops.clone(),
            self.running.clone(),
        );
        let consumer_handle = tokio::spawn(async move { consumer.run().await });

        let monitor_handle = self.spawn_monitor();

        let processor_running = self.running.clone();
        tokio::select! {
            _ = self.process_loop() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                processor_running.store(false, Ordering::Relaxed);
            }
        }

        join_or_abort(consumer_handle, "consumer").await;
        join_or_abort(monitor_handle, "monitor").await;

        if let Some(csv) = &self.csv_log {
            csv.flush().await.ok();
        }

        Ok(())
    }

    fn spawn_monitor(&self) -> tokio::task::JoinHandle<()> {
        let interval_secs = self.config.monitor_interval_seconds.max(1);
        let queue = self.queue.clone();
        let produce_rate = self.produce_rate.clone();
        let process_rate = self.process_rate.clone();
        let alerter = self.alerter.clone();
        let enrichment = self.enrichment.clone();
        let csv_log = self.csv_log.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                info!(
                    queue_depth = queue.depth(),
                    produce_rate = produce_rate.current_rate(),
                    process_rate = process_rate.current_rate(),
                    max_observed_distance_km = alerter.max_observed_distance_km(),
                    missing_hex = ?enrichment.missing_hex_sorted(),
                    "pipeline status"
                );
                if let Some(csv) = &csv_log {
                    if let Err(e) = csv.flush().await {
                        error!(error = %e, "failed to flush CSV archive log");
                    }
                }
            }
        })
    }

    async fn process_loop(&self) {
        while self.running.load(Ordering::Relaxed) {
            let msg = match self.queue.get(Duration::from_secs(1)).await {
                Ok(msg) => msg,
                Err(_) => continue,
            };

            self.process_rate.record();

            if let Some(csv) = &self.csv_log {
                if let Err(e) = csv.append(&msg).await {
                    error!(error = %e, "failed to append to CSV archive log");
                }
            }

            self.aggregator.merge(&msg).await;

            if let (Some(lat), Some(lon)) = (msg.latitude_f64(), msg.longitude_f64()) {
                let distance = self.alerter.record_distance(lat, lon);
                let snapshot = self.aggregator.snapshot(&msg.hex_ident).await;
                self.alerter.maybe_alert(&msg.hex_ident, &snapshot, distance).await;
            }
        }
    }
}

async fn resolve_home(config: &Config) -> Result<Coordinates, StartupError> {
    if let (Some(lat), Some(lon)) = (config.home_lat, config.home_lon) {
        return Ok(Coordinates { lat, lon });
    }

    let provider = GpsdLocationProvider::new(config.gpsd_host.clone(), config.gpsd_port);
    provider
        .resolve_home(Duration::from_secs(config.location_startup_timeout_seconds))
        .await
        .map_err(StartupError::HomeCoordinatesUnresolved)
}

/// Gives a task up to `DRAIN_TIMEOUT` to notice `running` has cleared and
/// return on its own before hard-killing it.
async fn join_or_abort(handle: tokio::task::JoinHandle<()>, label: &str) {
    let abort = handle.abort_handle();
    if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
        tracing::warn!(task = label, "did not drain within timeout, aborting");
        abort.abort();
    }
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    let client = http_client::build(None);

    if let Some(url) = &config.discord_webhook_url {
        return Arc::new(DiscordWebhookNotifier::from_url(client, url.clone()));
    }

    if let (Some(id), Some(token)) = (&config.webhook_id, &config.webhook_token) {
        return Arc::new(DiscordWebhookNotifier::from_id_and_token(client, id, token));
    }

    Arc::new(NullNotifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_home_prefers_injected_coordinates_over_location_provider() {
        let mut config = Config::parse_from_for_test();
        config.home_lat = Some(37.78);
        config.home_lon = Some(-122.15);

        let home = resolve_home(&config).await.unwrap();
        assert_eq!(home.lat, 37.78);
        assert_eq!(home.lon, -122.15);
    }
}

#[cfg(test)]
impl Config {
    fn parse_from_for_test() -> Self {
        <Config as clap::Parser>::parse_from(["skywatch"])
    }
}
