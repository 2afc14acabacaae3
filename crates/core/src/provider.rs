//! Adapter contracts: the abstraction over LLM backends.
//!
//! An adapter knows how to turn a [`Context`] (plus system prompt, token
//! limit and tool list) into a model response, either as one complete
//! [`PromptResponse`] or as a stream of [`PromptResponseDelta`]s.
//!
//! Implementations live outside this crate (Ollama, OpenAI, Anthropic,
//! custom endpoints). The core only calls them.

use std::future::Future;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::context::Context;
use crate::error::AdapterError;
use crate::message::Message;
use crate::tool::{Tool, ToolCall};

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the response
    Stop,
    /// The token limit was reached
    Length,
    /// The provider filtered the content
    ContentFilter,
    /// The model is waiting on tool results
    ToolCalls,
    /// The provider reported no stop reason
    Null,
}

impl StopReason {
    /// Stop reasons after which there is nothing left to resolve.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Stop | Self::Length | Self::ContentFilter)
    }
}

/// A complete response from one adapter round-trip (or one aggregated
/// stream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    /// The generated message
    pub message: Message,

    /// Why generation stopped
    pub stop_reason: StopReason,

    /// Tokens consumed by this round-trip
    pub token_usage: u32,

    /// Tool calls requested by the model, in the order it listed them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl PromptResponse {
    /// Tool calls as a slice; empty when none were requested.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

/// One unit of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptResponseDelta {
    /// Partial content
    #[serde(default)]
    pub content: String,

    /// Stop reason, usually only on the final delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,

    /// A complete tool call carried by this delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,

    /// Tokens consumed so far by the whole response
    #[serde(default)]
    pub cumulative_tokens: u32,
}

impl PromptResponseDelta {
    /// A delta carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_stop_reason(mut self, stop_reason: StopReason) -> Self {
        self.stop_reason = Some(stop_reason);
        self
    }

    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_call = Some(tool_call);
        self
    }

    pub fn with_cumulative_tokens(mut self, tokens: u32) -> Self {
        self.cumulative_tokens = tokens;
        self
    }
}

/// Everything an adapter receives for one round-trip.
///
/// The context is the adapter's own value; nothing it does can change the
/// caller's history.
#[derive(Debug, Clone)]
pub struct AdapterRequest {
    /// The conversation so far
    pub context: Context,

    /// System prompt to send ahead of the history
    pub system_message: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Tools the model may call
    pub tools: Option<Vec<Tool>>,
}

impl AdapterRequest {
    pub fn tools(&self) -> &[Tool] {
        self.tools.as_deref().unwrap_or_default()
    }
}

/// A lazy, single-subscriber sequence of deltas. The stream ends with either
/// completion (`None`) or an `Err` item; consumers stop polling after the
/// first error.
pub type DeltaStream = BoxStream<'static, std::result::Result<PromptResponseDelta, AdapterError>>;

/// A backend that returns a complete response per request.
#[async_trait]
pub trait BatchAdapter: Send + Sync {
    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: AdapterRequest,
    ) -> std::result::Result<PromptResponse, AdapterError>;
}

/// A backend that streams its response.
pub trait StreamAdapter: Send + Sync {
    /// Start a streamed response. Nothing is polled until the caller consumes
    /// the returned stream.
    fn stream(&self, request: AdapterRequest) -> DeltaStream;
}

/// A [`BatchAdapter`] backed by an async closure.
pub struct BatchFn<F>(F);

/// Wrap an async closure `Fn(AdapterRequest) -> impl Future<Output = Result<PromptResponse, AdapterError>>`.
pub fn batch_fn<F, Fut>(f: F) -> BatchFn<F>
where
    F: Fn(AdapterRequest) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<PromptResponse, AdapterError>> + Send + 'static,
{
    BatchFn(f)
}

#[async_trait]
impl<F, Fut> BatchAdapter for BatchFn<F>
where
    F: Fn(AdapterRequest) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<PromptResponse, AdapterError>> + Send + 'static,
{
    async fn complete(
        &self,
        request: AdapterRequest,
    ) -> std::result::Result<PromptResponse, AdapterError> {
        (self.0)(request).await
    }
}

/// A [`StreamAdapter`] backed by a closure returning a [`DeltaStream`].
pub struct StreamFn<F>(F);

pub fn stream_fn<F>(f: F) -> StreamFn<F>
where
    F: Fn(AdapterRequest) -> DeltaStream + Send + Sync,
{
    StreamFn(f)
}

impl<F> StreamAdapter for StreamFn<F>
where
    F: Fn(AdapterRequest) -> DeltaStream + Send + Sync,
{
    fn stream(&self, request: AdapterRequest) -> DeltaStream {
        (self.0)(request)
    }
}

/// Expose the receiving half of an mpsc channel as a [`DeltaStream`].
///
/// Provider implementations commonly spawn a task that parses SSE chunks and
/// forwards them over a channel; dropping the sender completes the stream.
pub fn delta_stream_from_receiver(
    rx: mpsc::Receiver<std::result::Result<PromptResponseDelta, AdapterError>>,
) -> DeltaStream {
    ReceiverStream::new(rx).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn request() -> AdapterRequest {
        AdapterRequest {
            context: Context::new().add_message(Message::user("Hi")),
            system_message: "Be brief.".into(),
            max_tokens: 64,
            tools: None,
        }
    }

    #[test]
    fn final_stop_reasons() {
        assert!(StopReason::Stop.is_final());
        assert!(StopReason::Length.is_final());
        assert!(StopReason::ContentFilter.is_final());
        assert!(!StopReason::ToolCalls.is_final());
        assert!(!StopReason::Null.is_final());
    }

    #[test]
    fn stop_reason_wire_names() {
        let json = serde_json::to_string(&StopReason::ContentFilter).unwrap();
        assert_eq!(json, r#""content_filter""#);
    }

    #[test]
    fn absent_tool_calls_read_as_empty() {
        let response = PromptResponse {
            message: Message::model("Hello"),
            stop_reason: StopReason::Stop,
            token_usage: 3,
            tool_calls: None,
        };
        assert!(response.tool_calls().is_empty());
        assert!(!response.has_tool_calls());
    }

    #[tokio::test]
    async fn closure_batch_adapter_sees_request() {
        let adapter = batch_fn(|req: AdapterRequest| async move {
            Ok(PromptResponse {
                message: Message::model(format!("{} / {}", req.system_message, req.context.len())),
                stop_reason: StopReason::Stop,
                token_usage: req.max_tokens,
                tool_calls: None,
            })
        });
        let response = adapter.complete(request()).await.unwrap();
        assert_eq!(response.message.content, "Be brief. / 1");
        assert_eq!(response.token_usage, 64);
    }

    #[tokio::test]
    async fn receiver_stream_completes_when_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(PromptResponseDelta::text("A"))).await.unwrap();
        tx.send(Ok(PromptResponseDelta::text("B"))).await.unwrap();
        drop(tx);

        let adapter = stream_fn(move |_req| futures::stream::empty().boxed());
        assert!(adapter.stream(request()).next().await.is_none());

        let deltas: Vec<_> = delta_stream_from_receiver(rx).collect().await;
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[1].as_ref().unwrap().content, "B");
    }
}
