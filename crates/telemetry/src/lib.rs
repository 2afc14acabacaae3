//! Log setup and usage accounting for Palaver.
//!
//! [`init_tracing`] installs the global `tracing` subscriber the library's
//! log events flow into. [`UsageLedger`] subscribes to the core's
//! resolution events and tallies rounds, tokens and tool outcomes.

pub mod ledger;
pub mod logging;

pub use ledger::{UsageLedger, UsageSummary, collect};
pub use logging::{init_from_config, init_tracing};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}
