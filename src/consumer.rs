//! Stream consumer (C6): connects to the SBS-1 decoder over TCP, reassembles
//! partial frames, filters and validates lines, and enqueues parsed messages
//! onto the backlog queue (C7) with a drop-newest-on-full policy.
//!
//! Reconnection shape (capped exponential backoff, reset on a successful
//! operation-phase disconnect) follows the rest of the fleet's transport
//! loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::metrics::{DropCounter, RateMeter};
use crate::queue::BacklogQueue;
use crate::sbs::{LineFramer, SbsMessage, parse_sbs_line};

const PUT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_BUF_SIZE: usize = 8192;
const INITIAL_RETRY_DELAY_SECONDS: u64 = 1;
const MAX_RETRY_DELAY_SECONDS: u64 = 60;

pub struct Consumer {
    host: String,
    port: u16,
    queue: Arc<BacklogQueue<SbsMessage>>,
    produce_rate: Arc<RateMeter>,
    drops: Arc<DropCounter>,
    running: Arc<AtomicBool>,
}

impl Consumer {
    pub fn new(
        host: String,
        port: u16,
        queue: Arc<BacklogQueue<SbsMessage>>,
        produce_rate: Arc<RateMeter>,
        drops: Arc<DropCounter>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            host,
            port,
            queue,
            produce_rate,
            drops,
            running,
        }
    }

    /// Runs the reconnect/read loop until `running` is cleared. Never
    /// returns an error: transient failures are logged and retried.
    pub async fn run(&self) {
        let mut current_delay = INITIAL_RETRY_DELAY_SECONDS;

        while self.running.load(Ordering::Relaxed) {
            match self.connect_and_process().await {
                Ok(()) => {
                    info!("SBS connection closed cleanly, reconnecting");
                    current_delay = INITIAL_RETRY_DELAY_SECONDS;
                }
                Err(e) => {
                    warn!(error = %e, delay_seconds = current_delay, "SBS connection failed, retrying");
                    sleep(Duration::from_secs(current_delay)).await;
                    current_delay = (current_delay * 2).min(MAX_RETRY_DELAY_SECONDS);
                }
            }
        }
    }

    async fn connect_and_process(&self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        info!(addr, "connecting to SBS decoder");
        let mut stream = TcpStream::connect(&addr).await?;
        info!(addr, "connected to SBS decoder");

        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];

        while self.running.load(Ordering::Relaxed) {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                info!("SBS decoder closed the connection");
                return Ok(());
            }

            for line in framer.push(&buf[..n]) {
                self.handle_line(&line).await;
            }
        }

        Ok(())
    }

    async fn handle_line(&self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || !trimmed.starts_with("MSG") {
            return;
        }

        let msg = match parse_sbs_line(trimmed) {
            Ok(msg) => msg,
            Err(_) => return,
        };

        self.produce_rate.record();

        match self.queue.put(msg, PUT_TIMEOUT).await {
            Ok(()) => {}
            Err(_) => {
                self.drops.record();
                warn!("backlog queue full, dropping newest message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_line_drops_non_msg_lines() {
        let queue = Arc::new(BacklogQueue::new(10));
        let consumer = Consumer::new(
            "localhost".to_string(),
            0,
            queue.clone(),
            Arc::new(RateMeter::new("test_produce")),
            Arc::new(DropCounter::new()),
            Arc::new(AtomicBool::new(true)),
        );

        consumer.handle_line("STA,3,1,1,A12F52,1,,,,,,,,,,,,,,,,0").await;
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn handle_line_enqueues_valid_msg_line() {
        let queue = Arc::new(BacklogQueue::new(10));
        let consumer = Consumer::new(
            "localhost".to_string(),
            0,
            queue.clone(),
            Arc::new(RateMeter::new("test_produce_2")),
            Arc::new(DropCounter::new()),
            Arc::new(AtomicBool::new(true)),
        );

        consumer
            .handle_line("MSG,1,1,1,A12F52,1,,,,,SWA123,,,,,,,,,,,0")
            .await;
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn handle_line_drops_short_lines() {
        let queue = Arc::new(BacklogQueue::new(10));
        let consumer = Consumer::new(
            "localhost".to_string(),
            0,
            queue.clone(),
            Arc::new(RateMeter::new("test_produce_3")),
            Arc::new(DropCounter::new()),
            Arc::new(AtomicBool::new(true)),
        );

        consumer.handle_line("MSG,1,1,1,A12F52").await;
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn handle_line_drops_newest_when_queue_is_full() {
        let queue = Arc::new(BacklogQueue::new(1));
        let drops = Arc::new(DropCounter::new());
        let consumer = Consumer::new(
            "localhost".to_string(),
            0,
            queue.clone(),
            Arc::new(RateMeter::new("test_produce_4")),
            drops.clone(),
            Arc::new(AtomicBool::new(true)),
        );

        consumer
            .handle_line("MSG,1,1,1,A12F52,1,,,,,SWA123,,,,,,,,,,,0")
            .await;
        consumer
            .handle_line("MSG,1,1,1,B22F53,1,,,,,SWA124,,,,,,,,,,,0")
            .await;

        assert_eq!(queue.depth(), 1);
        assert_eq!(drops.total(), 1);
    }
}
