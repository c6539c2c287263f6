//! Shared error types used where a caller needs to match on a specific
//! failure kind rather than treat everything as an opaque `anyhow::Error`.
//! Most of the crate propagates `anyhow::Error` at call boundaries; these
//! two enums are the deliberate exceptions, per the error-handling design.

pub use crate::queue::QueueError;

use thiserror::Error;

/// Startup-only failures that exit the process with code 2, per the
/// process lifecycle contract. Everything else recovers in place.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no home coordinates were injected and the location provider did not resolve one: {0}")]
    HomeCoordinatesUnresolved(#[source] anyhow::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StartupError {
    /// Exit code this failure maps to, per §6's process lifecycle contract.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
