//! The conversation context, an immutable append-only message history.
//!
//! Every "modifying" operation returns a new [`Context`]. The history is
//! held in an `Arc<Vec<Message>>` that is copied on write, so cloning is
//! cheap and no change made through one value is ever visible through
//! another.
//!
//! ```rust,ignore
//! let pending = Context::new()
//!     .add_message(Message::user("Hi"))
//!     .transform_with(|ctx| ctx)
//!     .send(&adapter, SendOptions::new("Be brief.", 256))
//!     .await?;
//! let context = pending.resolve_without();
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::aggregate;
use crate::error::{Error, Result};
use crate::event::{EventBus, ResolutionEvent, Termination};
use crate::message::Message;
use crate::pending::{PendingResponse, publish_finished};
use crate::provider::{
    AdapterRequest, BatchAdapter, DeltaStream, PromptResponse, PromptResponseDelta, StreamAdapter,
};
use crate::tool::Tool;

/// Default generation limit when none is configured.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// An ordered, immutable transcript of messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    history: Arc<Vec<Message>>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new context with `message` appended. The receiver is
    /// unchanged.
    pub fn add_message(&self, message: Message) -> Self {
        let mut history = Vec::with_capacity(self.history.len() + 1);
        history.extend(self.history.iter().cloned());
        history.push(message);
        Self {
            history: Arc::new(history),
        }
    }

    /// Consuming form of [`Context::add_message`]. Appends in place when this
    /// value holds the only reference to its history, copies otherwise.
    pub fn append(mut self, message: Message) -> Self {
        Arc::make_mut(&mut self.history).push(message);
        self
    }

    /// Apply an arbitrary transformation.
    pub fn transform_with<F>(self, transformer: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        transformer(self)
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.history.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.history.iter()
    }

    /// Send this context to a batch adapter.
    ///
    /// The adapter receives its own copy of the context. The returned
    /// [`PendingResponse`] holds this (pre-response) context together with
    /// the options needed to continue the exchange. A failed invocation ends
    /// the resolution and is published as [`Termination::Failed`].
    pub async fn send<A>(self, adapter: &A, options: SendOptions) -> Result<PendingResponse>
    where
        A: BatchAdapter + ?Sized,
    {
        let events = options.events.clone();
        self.dispatch(adapter, options).await.inspect_err(|_| {
            publish_finished(events.as_deref(), Termination::Failed, 0, 0);
        })
    }

    /// One batch round-trip. Failures are left for the caller to report.
    pub(crate) async fn dispatch<A>(
        self,
        adapter: &A,
        options: SendOptions,
    ) -> Result<PendingResponse>
    where
        A: BatchAdapter + ?Sized,
    {
        debug!(
            messages = self.len(),
            max_tokens = options.max_tokens,
            tools = options.tools.as_ref().map_or(0, Vec::len),
            "Sending context to batch adapter"
        );

        let response = adapter
            .complete(options.request(self.clone()))
            .await
            .map_err(|e| {
                warn!(error = %e, "Batch adapter failed");
                Error::AdapterInvocation(e)
            })?;

        options.report_response(&response, false);
        Ok(PendingResponse::new(response, self, options))
    }

    /// Start a streamed response and return the raw delta stream for custom
    /// handling.
    pub fn send_streaming<A>(self, adapter: &A, options: &SendOptions) -> DeltaStream
    where
        A: StreamAdapter + ?Sized,
    {
        debug!(
            messages = self.len(),
            max_tokens = options.max_tokens,
            "Opening delta stream"
        );
        adapter.stream(options.request(self))
    }

    /// Stream a response, invoking `on_delta` for every delta before it is
    /// folded, and aggregate the result into a [`PendingResponse`].
    ///
    /// A stream error discards everything received so far and is published
    /// as [`Termination::Failed`].
    pub async fn send_streaming_with_callback<A, F>(
        self,
        adapter: &A,
        options: SendOptions,
        on_delta: F,
    ) -> Result<PendingResponse>
    where
        A: StreamAdapter + ?Sized,
        F: FnMut(&PromptResponseDelta),
    {
        let stream = self.clone().send_streaming(adapter, &options);
        let response = match aggregate(stream, on_delta).await {
            Ok(response) => response,
            Err(err) => {
                publish_finished(options.events.as_deref(), Termination::Failed, 0, 0);
                return Err(err);
            }
        };
        options.report_response(&response, true);
        Ok(PendingResponse::new(response, self, options))
    }

    /// Stream a response and aggregate it without observing the deltas.
    pub async fn send_streaming_aggregate<A>(
        self,
        adapter: &A,
        options: SendOptions,
    ) -> Result<PendingResponse>
    where
        A: StreamAdapter + ?Sized,
    {
        self.send_streaming_with_callback(adapter, options, |_| {})
            .await
    }
}

impl From<Vec<Message>> for Context {
    fn from(history: Vec<Message>) -> Self {
        Self {
            history: Arc::new(history),
        }
    }
}

impl FromIterator<Message> for Context {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Per-request settings for `send*`, carried forward by the
/// [`PendingResponse`] so re-invocations use the same values.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// System prompt sent ahead of the history
    pub system_message: String,

    /// Maximum tokens to generate per response
    pub max_tokens: u32,

    /// Tools offered to the model
    pub tools: Option<Vec<Tool>>,

    /// Where to publish resolution events, if anywhere
    pub events: Option<Arc<EventBus>>,
}

impl SendOptions {
    pub fn new(system_message: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system_message: system_message.into(),
            max_tokens,
            tools: None,
            events: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    fn request(&self, context: Context) -> AdapterRequest {
        AdapterRequest {
            context,
            system_message: self.system_message.clone(),
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
        }
    }

    pub(crate) fn publish(&self, event: ResolutionEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    fn report_response(&self, response: &PromptResponse, streamed: bool) {
        debug!(
            stop_reason = ?response.stop_reason,
            token_usage = response.token_usage,
            tool_calls = response.tool_calls().len(),
            streamed,
            "Received prompt response"
        );
        self.publish(ResolutionEvent::ResponseReceived {
            stop_reason: response.stop_reason,
            token_usage: response.token_usage,
            tool_calls: response.tool_calls().len(),
            streamed,
            timestamp: Utc::now(),
        });
    }
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_MAX_TOKENS)
    }
}
