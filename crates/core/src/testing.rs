//! Scripted adapters and response builders for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for downstream crates and integration tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::AdapterError;
use crate::message::Message;
use crate::provider::{
    AdapterRequest, BatchAdapter, DeltaStream, PromptResponse, PromptResponseDelta, StopReason,
    StreamAdapter,
};
use crate::tool::ToolCall;

/// A batch adapter that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue. Once the
/// queue is empty every further call fails with an [`AdapterError`].
/// Every request received is recorded for later inspection.
pub struct ScriptedAdapter {
    responses: Mutex<Vec<Result<PromptResponse, AdapterError>>>,
    requests: Mutex<Vec<AdapterRequest>>,
}

impl ScriptedAdapter {
    pub fn new(responses: Vec<PromptResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Script failures as well as responses.
    pub fn with_results(results: Vec<Result<PromptResponse, AdapterError>>) -> Self {
        let mut responses = results;
        // Popped from the back.
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map_or(0, |r| r.len())
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<AdapterRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BatchAdapter for ScriptedAdapter {
    async fn complete(&self, request: AdapterRequest) -> Result<PromptResponse, AdapterError> {
        let call = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|_| AdapterError::other("request log poisoned"))?;
            requests.push(request);
            requests.len()
        };

        let next = self
            .responses
            .lock()
            .map_err(|_| AdapterError::other("response queue poisoned"))?
            .pop();

        next.unwrap_or_else(|| {
            Err(AdapterError::other(format!(
                "ScriptedAdapter: no more responses (call #{call})"
            )))
        })
    }
}

/// A stream adapter that replays the same scripted deltas on every request.
pub struct ScriptedStream {
    deltas: Vec<Result<PromptResponseDelta, AdapterError>>,
}

impl ScriptedStream {
    pub fn new(deltas: Vec<Result<PromptResponseDelta, AdapterError>>) -> Self {
        Self { deltas }
    }
}

impl StreamAdapter for ScriptedStream {
    fn stream(&self, _request: AdapterRequest) -> DeltaStream {
        futures::stream::iter(self.deltas.clone()).boxed()
    }
}

/// A final text response.
pub fn text_response(text: &str, token_usage: u32) -> PromptResponse {
    PromptResponse {
        message: Message::model(text),
        stop_reason: StopReason::Stop,
        token_usage,
        tool_calls: None,
    }
}

/// A response that stops to wait on `calls`.
pub fn tool_call_response(text: &str, calls: Vec<ToolCall>, token_usage: u32) -> PromptResponse {
    PromptResponse {
        message: Message::model(text),
        stop_reason: StopReason::ToolCalls,
        token_usage,
        tool_calls: Some(calls),
    }
}

/// Split a response into the deltas a streaming backend might emit for it:
/// one per character of content, then one per tool call, with the stop
/// reason and full token count on the last delta.
pub fn deltas_for(response: &PromptResponse) -> Vec<PromptResponseDelta> {
    let mut deltas: Vec<PromptResponseDelta> = response
        .message
        .content
        .chars()
        .map(|c| PromptResponseDelta::text(c.to_string()))
        .collect();
    deltas.extend(
        response
            .tool_calls()
            .iter()
            .cloned()
            .map(|call| PromptResponseDelta::default().with_tool_call(call)),
    );

    let last = deltas.pop().unwrap_or_default();
    deltas.push(
        last.with_stop_reason(response.stop_reason)
            .with_cumulative_tokens(response.token_usage),
    );
    deltas
}
