//! Rate metering and process counters/gauges (C15), mirrored through the
//! `metrics` facade the same way the rest of the fleet instruments itself.
//! No exporter/scrape endpoint is started here — that's an outer surface
//! this pipeline doesn't own — but every instrumentation point exists so
//! one can be attached externally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Tracks a count and reports it as an instantaneous "events per second"
/// once `tick` has accumulated at least one second, then resets the window.
/// Used for both `msg_rate_produce` (consumer) and `msg_rate_process`
/// (processor).
pub struct RateMeter {
    name: &'static str,
    count: AtomicU64,
    window_start: std::sync::Mutex<Instant>,
    last_rate: AtomicU64, // bits of an f64, via to_bits/from_bits
}

impl RateMeter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            count: AtomicU64::new(0),
            window_start: std::sync::Mutex::new(Instant::now()),
            last_rate: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    pub fn record(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(self.name).increment(1);
        self.maybe_tick();
    }

    fn maybe_tick(&self) {
        let mut start = self.window_start.lock().unwrap();
        let elapsed = start.elapsed();
        if elapsed.as_secs_f64() >= 1.0 {
            let count = self.count.swap(0, Ordering::Relaxed) as f64;
            let rate = count / elapsed.as_secs_f64();
            self.last_rate.store(rate.to_bits(), Ordering::Relaxed);
            metrics::gauge!(self.name_rate()).set(rate);
            *start = Instant::now();
        }
    }

    fn name_rate(&self) -> String {
        format!("{}_rate", self.name)
    }

    pub fn current_rate(&self) -> f64 {
        f64::from_bits(self.last_rate.load(Ordering::Relaxed))
    }
}

/// Counts messages dropped because the backlog queue was full.
pub struct DropCounter {
    count: AtomicU64,
}

impl DropCounter {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    pub fn record(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("msg_dropped_full_queue").increment(1);
    }

    pub fn total(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for DropCounter {
    fn default() -> Self {
        Self::new()
    }
}
