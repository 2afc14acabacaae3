//! Error types for conversation resolution.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Adapter and protocol failures propagate as [`Error`]; tool failures are
//! [`ToolError`]s that the engine folds into the transcript instead.

use thiserror::Error;

use crate::provider::StopReason;

/// The top-level error type for send and resolution operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The batch adapter rejected the request.
    #[error("Adapter invocation failed: {0}")]
    AdapterInvocation(#[source] AdapterError),

    /// The streaming adapter terminated with an error instead of completing.
    #[error("Stream failed: {0}")]
    Stream(#[source] AdapterError),

    /// The adapter returned a stop reason the engine has no policy for.
    #[error("Unhandled stop reason {stop_reason:?} at depth {depth}")]
    UnhandledStopReason { stop_reason: StopReason, depth: u32 },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a batch or streaming adapter.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A single tool call failed.
///
/// Recoverable: the resolution loop renders it into the tool-result message
/// and keeps going.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    ExecutionFailed(String),
}

impl ToolError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed(reason.into())
    }
}

/// Conversion of a JSON value into an `ArgumentValue` failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("null is not a valid argument value (at {path})")]
    Null { path: String },

    #[error("number {0} cannot be represented as an integer or a finite float")]
    UnrepresentableNumber(String),
}
