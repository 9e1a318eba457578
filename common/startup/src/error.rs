//! Error types returned by the tracker's query operations.

use thiserror::Error;

/// Failures reading one of the process clock sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// No monotonic source is known for this platform.
    #[error("process clock sources are not supported on this platform")]
    Unsupported,

    #[error("failed to read {path}: {reason}")]
    Unreadable {
        path: &'static str,
        reason: String,
    },

    #[error("unexpected contents in {path}: {reason}")]
    Malformed {
        path: &'static str,
        reason: String,
    },

    /// A later reading came out earlier than the one it is measured against.
    #[error("clock regressed: end {end}ms is before start {start}ms")]
    Regressed { start: i64, end: i64 },
}

/// Errors surfaced to callers of [`StartupTracker`](crate::StartupTracker) queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    /// No bundle load signal has been observed yet. Retry once it has fired.
    #[error("baseline not recorded, lifecycle signal never observed")]
    Uninitialized,

    #[error(transparent)]
    Clock(#[from] ClockError),
}

impl StartupError {
    /// Stable, machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            StartupError::Uninitialized => "NO_START_TIME",
            StartupError::Clock(_) => "CLOCK_UNAVAILABLE",
        }
    }
}
