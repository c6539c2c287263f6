//! Bounded backlog queue (C7) decoupling the stream consumer from the
//! processor loop.
//!
//! Single producer (the consumer task), single consumer (the processor
//! loop). Built directly on `flume::bounded`, matching the rest of the fleet
//! (see the intake queues in the run command). `put` enforces the
//! drop-newest-on-full backpressure policy with a timeout rather than
//! blocking forever; `get` times out rather than blocking forever so the
//! processor loop can notice a shutdown signal between polls.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
    #[error("queue is empty")]
    Empty,
}

/// Bounded FIFO backlog queue.
#[derive(Clone)]
pub struct BacklogQueue<T> {
    tx: flume::Sender<T>,
    rx: flume::Receiver<T>,
}

impl<T: Send + 'static> BacklogQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self { tx, rx }
    }

    /// Enqueue an item, waiting up to `timeout` for room. Returns
    /// `QueueError::Full` if the queue is still full when the timeout
    /// elapses — the caller (the consumer) is expected to drop the message
    /// on this outcome rather than retry.
    pub async fn put(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        match tokio::time::timeout(timeout, self.tx.send_async(item)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(QueueError::Full), // receiver dropped; treat like full
            Err(_) => Err(QueueError::Full),
        }
    }

    /// Dequeue the next item, waiting up to `timeout`. Returns
    /// `QueueError::Empty` if nothing arrives before the timeout elapses.
    pub async fn get(&self, timeout: Duration) -> Result<T, QueueError> {
        match tokio::time::timeout(timeout, self.rx.recv_async()).await {
            Ok(Ok(item)) => Ok(item),
            Ok(Err(_)) => Err(QueueError::Empty), // sender dropped
            Err(_) => Err(QueueError::Empty),
        }
    }

    /// Current number of items buffered, for the monitor task.
    pub fn depth(&self) -> usize {
        self.rx.len()
    }
}
