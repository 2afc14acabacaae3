//! Stream aggregation into one canonical response.
//!
//! Downstream resolution logic only ever sees a [`PromptResponse`], whether
//! the response arrived whole or as a stream.

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::{AdapterError, Error, Result};
use crate::message::Message;
use crate::provider::{PromptResponse, PromptResponseDelta, StopReason};
use crate::tool::ToolCall;

/// Incremental accumulator for streamed deltas.
///
/// Deltas must be pushed in emission order: content and tool calls are
/// appended, and the last stop reason seen wins.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    content: String,
    // None until a delta carries a stop reason; distinct from StopReason::Null
    stop_reason: Option<StopReason>,
    tool_calls: Vec<ToolCall>,
    cumulative_tokens: u32,
    deltas: usize,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the accumulator.
    pub fn push(&mut self, delta: PromptResponseDelta) {
        self.deltas += 1;
        self.content.push_str(&delta.content);
        if let Some(call) = delta.tool_call {
            self.tool_calls.push(call);
        }
        if let Some(reason) = delta.stop_reason {
            self.stop_reason = Some(reason);
        }
        self.cumulative_tokens = delta.cumulative_tokens;
    }

    /// Content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The last stop reason observed, if any.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Number of deltas folded so far.
    pub fn len(&self) -> usize {
        self.deltas
    }

    pub fn is_empty(&self) -> bool {
        self.deltas == 0
    }

    /// Synthesize the canonical response once the stream has completed.
    pub fn finish(self) -> PromptResponse {
        let stop_reason = self.stop_reason.unwrap_or_else(|| {
            debug!(deltas = self.deltas, "Stream completed without a stop reason");
            StopReason::Null
        });

        PromptResponse {
            message: Message::model(self.content),
            stop_reason,
            token_usage: self.cumulative_tokens,
            tool_calls: (!self.tool_calls.is_empty()).then_some(self.tool_calls),
        }
    }
}

/// Consume a delta stream and aggregate it into a [`PromptResponse`].
///
/// `on_delta` runs for every delta before it is folded. If the stream yields
/// an error, aggregation fails as a whole and nothing after the error is
/// polled.
pub async fn aggregate<S, F>(mut stream: S, mut on_delta: F) -> Result<PromptResponse>
where
    S: Stream<Item = std::result::Result<PromptResponseDelta, AdapterError>> + Unpin,
    F: FnMut(&PromptResponseDelta),
{
    let mut aggregator = StreamAggregator::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(delta) => {
                on_delta(&delta);
                aggregator.push(delta);
            }
            Err(err) => {
                warn!(
                    deltas = aggregator.len(),
                    error = %err,
                    "Delta stream failed, discarding partial response"
                );
                return Err(Error::Stream(err));
            }
        }
    }

    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgumentValue;
    use futures::stream;

    fn deltas(
        items: Vec<std::result::Result<PromptResponseDelta, AdapterError>>,
    ) -> impl Stream<Item = std::result::Result<PromptResponseDelta, AdapterError>> + Unpin {
        stream::iter(items)
    }

    #[tokio::test]
    async fn split_content_matches_single_delta() {
        let split = aggregate(
            deltas(vec![
                Ok(PromptResponseDelta::text("A")),
                Ok(PromptResponseDelta::text("B")),
            ]),
            |_| {},
        )
        .await
        .unwrap();
        let whole = aggregate(deltas(vec![Ok(PromptResponseDelta::text("AB"))]), |_| {})
            .await
            .unwrap();

        assert_eq!(split.message.content, "AB");
        assert_eq!(split.message, whole.message);
    }

    #[tokio::test]
    async fn last_stop_reason_wins() {
        let response = aggregate(
            deltas(vec![
                Ok(PromptResponseDelta::default().with_stop_reason(StopReason::Stop)),
                Ok(PromptResponseDelta::default()),
                Ok(PromptResponseDelta::default().with_stop_reason(StopReason::ToolCalls)),
            ]),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(response.stop_reason, StopReason::ToolCalls);
    }

    #[tokio::test]
    async fn empty_stream_yields_null_and_zero_usage() {
        let response = aggregate(deltas(vec![]), |_| {}).await.unwrap();
        assert_eq!(response.stop_reason, StopReason::Null);
        assert_eq!(response.token_usage, 0);
        assert_eq!(response.message, Message::model(""));
        assert!(response.tool_calls.is_none());
    }

    #[tokio::test]
    async fn tool_calls_collected_in_order_and_tokens_from_last_delta() {
        let a = ToolCall::with_id("a", "first", ArgumentValue::empty_object());
        let b = ToolCall::with_id("b", "second", ArgumentValue::empty_object());
        let response = aggregate(
            deltas(vec![
                Ok(PromptResponseDelta::default()
                    .with_tool_call(a.clone())
                    .with_cumulative_tokens(3)),
                Ok(PromptResponseDelta::default()
                    .with_tool_call(b.clone())
                    .with_stop_reason(StopReason::ToolCalls)
                    .with_cumulative_tokens(11)),
            ]),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(response.tool_calls, Some(vec![a, b]));
        assert_eq!(response.token_usage, 11);
    }

    #[tokio::test]
    async fn error_discards_partial_response_after_callbacks() {
        let mut seen = 0;
        let result = aggregate(
            deltas(vec![
                Ok(PromptResponseDelta::text("partial")),
                Ok(PromptResponseDelta::text(" more")),
                Err(AdapterError::StreamInterrupted("connection reset".into())),
                Ok(PromptResponseDelta::text("never seen")),
            ]),
            |_| seen += 1,
        )
        .await;

        assert!(matches!(result, Err(Error::Stream(AdapterError::StreamInterrupted(_)))));
        assert_eq!(seen, 2);
    }
}
