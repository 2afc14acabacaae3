//! Resolution events for observing the engine without coupling to it.
//!
//! Events are published when a response arrives, a tool call finishes, or a
//! resolution terminates. Subscribers (such as a usage ledger) react without
//! the engine knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::provider::StopReason;

/// How a recursive resolution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model stopped with a final stop reason
    Completed,
    /// The call-depth counter reached zero
    DepthExhausted,
    /// The token budget reached zero
    BudgetExhausted,
    /// `ToolCalls` was reported without any calls
    EmptyToolCalls,
    /// An adapter or protocol failure aborted the resolution
    Failed,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::DepthExhausted => write!(f, "depth_exhausted"),
            Self::BudgetExhausted => write!(f, "budget_exhausted"),
            Self::EmptyToolCalls => write!(f, "empty_tool_calls"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// All events emitted while sending and resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionEvent {
    /// An adapter produced a response (batch, or aggregated stream)
    ResponseReceived {
        stop_reason: StopReason,
        token_usage: u32,
        tool_calls: usize,
        streamed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was resolved
    ToolExecuted {
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A recursive resolution terminated
    ResolutionFinished {
        termination: Termination,
        rounds: u32,
        tokens_used: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for resolution events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<ResolutionEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ResolutionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ResolutionEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
