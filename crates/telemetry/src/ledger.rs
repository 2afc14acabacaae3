//! Usage accounting from resolution events.

use std::sync::Arc;

use palaver_core::{ResolutionEvent, Termination};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Totals for one or more resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Adapter responses received, batch or streamed
    pub responses: u32,
    /// How many of those were aggregated from a stream
    pub streamed_responses: u32,
    /// Round-trips reported by finished resolutions
    pub rounds: u32,
    /// Sum of `token_usage` over all responses
    pub total_tokens: u64,
    pub tool_calls: u32,
    pub tool_failures: u32,
    /// Wall time spent inside tool resolvers
    pub tool_time_ms: u64,
    /// How the most recent resolution ended
    pub termination: Option<Termination>,
}

/// Folds [`ResolutionEvent`]s into a [`UsageSummary`].
#[derive(Debug, Default)]
pub struct UsageLedger {
    summary: UsageSummary,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event.
    pub fn record(&mut self, event: &ResolutionEvent) {
        let summary = &mut self.summary;
        match event {
            ResolutionEvent::ResponseReceived {
                token_usage,
                streamed,
                ..
            } => {
                summary.responses += 1;
                if *streamed {
                    summary.streamed_responses += 1;
                }
                summary.total_tokens += u64::from(*token_usage);
            }
            ResolutionEvent::ToolExecuted {
                success,
                duration_ms,
                ..
            } => {
                summary.tool_calls += 1;
                if !success {
                    summary.tool_failures += 1;
                }
                summary.tool_time_ms += duration_ms;
            }
            ResolutionEvent::ResolutionFinished {
                termination,
                rounds,
                ..
            } => {
                summary.rounds += rounds;
                summary.termination = Some(*termination);
            }
        }
    }

    pub fn summary(&self) -> &UsageSummary {
        &self.summary
    }

    pub fn into_summary(self) -> UsageSummary {
        self.summary
    }
}

/// Drain `rx` until a resolution finishes or the bus is dropped.
///
/// Lagged receivers skip the missed events with a warning; the summary then
/// undercounts.
pub async fn collect(mut rx: broadcast::Receiver<Arc<ResolutionEvent>>) -> UsageSummary {
    let mut ledger = UsageLedger::new();
    loop {
        match rx.recv().await {
            Ok(event) => {
                ledger.record(&event);
                if matches!(event.as_ref(), ResolutionEvent::ResolutionFinished { .. }) {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "Usage ledger lagged behind the event bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
    ledger.into_summary()
}
