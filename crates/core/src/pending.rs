//! Pending responses and the resolution engine.
//!
//! A [`PendingResponse`] is the state between an adapter round-trip and the
//! next [`Context`]: the model has answered, but its message has not been
//! merged into history yet. Each resolution strategy consumes the pending
//! response and either terminates (yielding a context) or advances by
//! running tools and calling the adapter again.
//!
//! ```rust,ignore
//! let context = context
//!     .send(&adapter, options)
//!     .await?
//!     // Choose one of these:
//!     .resolve_without()                                   // append the reply
//!     // .resolve(&tools).await                            // run tools once
//!     // .resolve_tool_calls_recurse(&tools, &adapter, 8, 4096).await?
//!     ;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::context::{Context, SendOptions};
use crate::error::{Error, Result, ToolError};
use crate::event::{EventBus, ResolutionEvent, Termination};
use crate::message::Message;
use crate::provider::{BatchAdapter, PromptResponse, StopReason};
use crate::tool::{Tool, ToolCall, ToolResolver, ToolResult, concat_tool_output};

/// Default number of adapter round-trips a recursive resolution may make.
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// Default token budget for a recursive resolution.
pub const DEFAULT_TOKEN_BUDGET: u32 = 16_384;

/// Bounds for [`PendingResponse::resolve_tool_calls_recurse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionLimits {
    pub max_depth: u32,
    pub token_budget: u32,
}

impl Default for ResolutionLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}

/// A response that has arrived but has not been folded into history.
#[derive(Debug, Clone)]
pub struct PendingResponse {
    /// The adapter's response
    pub prompt_response: PromptResponse,

    /// The context that was sent, without the response
    pub context: Context,

    /// Tools offered with the request
    pub tools: Option<Vec<Tool>>,

    /// System prompt sent with the request
    pub system_message: String,

    /// Generation limit the response was produced under
    pub max_tokens: u32,

    events: Option<Arc<EventBus>>,
}

impl PendingResponse {
    /// Pair a response with the context and options that produced it.
    pub fn new(prompt_response: PromptResponse, context: Context, options: SendOptions) -> Self {
        Self {
            prompt_response,
            context,
            tools: options.tools,
            system_message: options.system_message,
            max_tokens: options.max_tokens,
            events: options.events,
        }
    }

    /// The options needed to send a follow-up request the same way.
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            system_message: self.system_message.clone(),
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
            events: self.events.clone(),
        }
    }

    /// Whether the model stopped to wait on tool calls it actually listed.
    pub fn wants_tools(&self) -> bool {
        self.prompt_response.stop_reason == StopReason::ToolCalls
            && self.prompt_response.has_tool_calls()
    }

    /// Append the model's message and ignore any tool calls.
    pub fn resolve_without(self) -> Context {
        self.publish_single_round();
        self.into_context()
    }

    /// Append the model's message and, if it asked for tools, one tool-role
    /// message with every call's result. Never calls the adapter again.
    pub async fn resolve<R>(self, resolver: &R) -> Context
    where
        R: ToolResolver + ?Sized,
    {
        let advanced = self.exec_tool_calls(resolver).await;
        advanced.publish_single_round();
        advanced.context
    }

    /// Same as [`PendingResponse::resolve`] for a synchronous resolver.
    pub fn resolve_sync<F>(self, resolver: F) -> Context
    where
        F: Fn(&ToolCall) -> std::result::Result<String, ToolError>,
    {
        let results = self.wants_tools().then(|| {
            self.prompt_response
                .tool_calls()
                .iter()
                .map(|call| {
                    let started = Instant::now();
                    self.finish_tool_call(call, resolver(call), started)
                })
                .collect::<Vec<_>>()
        });
        let context = self.with_tool_results(results.as_deref());
        self.publish_single_round();
        context
    }

    /// Like [`PendingResponse::resolve`], but keep the pending response so
    /// further transformations can be chained. The returned value's context
    /// already contains the model message (and tool results, if any).
    ///
    /// Not terminal: no `ResolutionFinished` event is published.
    pub async fn exec_tool_calls<R>(self, resolver: &R) -> Self
    where
        R: ToolResolver + ?Sized,
    {
        let results = if self.wants_tools() {
            Some(self.execute_tool_calls(resolver).await)
        } else {
            None
        };
        let context = self.with_tool_results(results.as_deref());
        Self { context, ..self }
    }

    /// Run every requested tool call in order and return the individual
    /// results. Failures are rendered inline; one failing call never stops
    /// the others.
    pub async fn execute_tool_calls<R>(&self, resolver: &R) -> Vec<ToolResult>
    where
        R: ToolResolver + ?Sized,
    {
        let calls = self.prompt_response.tool_calls();
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let started = Instant::now();
            let outcome = resolver.resolve(call).await;
            results.push(self.finish_tool_call(call, outcome, started));
        }
        results
    }

    /// Resolve tool calls and re-prompt the adapter until the model stops,
    /// `depth` round-trips have been made, or `token_budget` is spent.
    ///
    /// Budget and depth exhaustion are not errors: the latest model message
    /// is appended and the context returned. A live `StopReason::Null` is a
    /// protocol violation and fails with [`Error::UnhandledStopReason`].
    pub async fn resolve_tool_calls_recurse<R, A>(
        self,
        resolver: &R,
        adapter: &A,
        depth: u32,
        token_budget: u32,
    ) -> Result<Context>
    where
        R: ToolResolver + ?Sized,
        A: BatchAdapter + ?Sized,
    {
        let mut pending = self;
        let mut depth = depth;
        let mut budget = token_budget;
        let mut rounds: u32 = 0;
        let mut tokens_used: u64 = 0;

        loop {
            rounds += 1;
            tokens_used += u64::from(pending.prompt_response.token_usage);
            let options = pending.send_options();
            let events = options.events.as_deref();

            if depth == 0 || budget == 0 {
                let termination = if depth == 0 {
                    Termination::DepthExhausted
                } else {
                    Termination::BudgetExhausted
                };
                publish_finished(events, termination, rounds, tokens_used);
                return Ok(pending.into_context());
            }

            match pending.prompt_response.stop_reason {
                StopReason::Stop | StopReason::Length | StopReason::ContentFilter => {
                    publish_finished(events, Termination::Completed, rounds, tokens_used);
                    return Ok(pending.into_context());
                }
                StopReason::Null => {
                    publish_finished(events, Termination::Failed, rounds, tokens_used);
                    return Err(Error::UnhandledStopReason {
                        stop_reason: StopReason::Null,
                        depth,
                    });
                }
                StopReason::ToolCalls => {
                    if !pending.prompt_response.has_tool_calls() {
                        // The model message is not appended on this path.
                        warn!(
                            depth,
                            "Stop reason is ToolCalls but no tool calls were returned"
                        );
                        publish_finished(events, Termination::EmptyToolCalls, rounds, tokens_used);
                        return Ok(pending.context);
                    }

                    let results = pending.execute_tool_calls(resolver).await;
                    let remaining = budget.saturating_sub(pending.prompt_response.token_usage);
                    let context = pending.with_tool_results(Some(&results));

                    debug!(
                        depth,
                        remaining_budget = remaining,
                        tool_calls = results.len(),
                        "Re-prompting adapter with tool results"
                    );

                    pending = match context.dispatch(adapter, options.clone()).await {
                        Ok(next) => next,
                        Err(err) => {
                            publish_finished(events, Termination::Failed, rounds, tokens_used);
                            return Err(err);
                        }
                    };
                    depth -= 1;
                    budget = remaining;
                }
            }
        }
    }

    /// [`PendingResponse::resolve_tool_calls_recurse`] with configured limits.
    pub async fn resolve_tool_calls_with<R, A>(
        self,
        resolver: &R,
        adapter: &A,
        limits: &ResolutionLimits,
    ) -> Result<Context>
    where
        R: ToolResolver + ?Sized,
        A: BatchAdapter + ?Sized,
    {
        self.resolve_tool_calls_recurse(resolver, adapter, limits.max_depth, limits.token_budget)
            .await
    }

    /// Reserved for a retry policy. No policy is defined yet, so this returns
    /// the pre-response context unchanged.
    pub async fn resolve_with_retry<R>(self, _resolver: &R, retry_depth: Option<usize>) -> Context
    where
        R: ToolResolver + ?Sized,
    {
        debug!(?retry_depth, "No retry policy defined, returning context unchanged");
        self.publish_single_round();
        self.context
    }

    /// Resolve with a custom async function.
    pub async fn resolve_with<F, Fut>(self, resolver: F) -> Context
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Context>,
    {
        resolver(self).await
    }

    /// Resolve with a custom synchronous function.
    pub fn resolve_with_sync<F>(self, resolver: F) -> Context
    where
        F: FnOnce(Self) -> Context,
    {
        resolver(self)
    }

    /// Transform with a custom async function, staying pending.
    pub async fn transform_with<F, Fut>(self, transformer: F) -> Self
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Self>,
    {
        transformer(self).await
    }

    pub fn transform_with_sync<F>(self, transformer: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        transformer(self)
    }

    /// The pre-response context with the model message appended, followed
    /// by one tool message when `results` is present.
    fn with_tool_results(&self, results: Option<&[ToolResult]>) -> Context {
        let context = self.context.add_message(self.prompt_response.message.clone());
        match results {
            Some(results) => context.append(Message::tool(concat_tool_output(results))),
            None => context,
        }
    }

    fn into_context(self) -> Context {
        self.context.append(self.prompt_response.message)
    }

    fn publish_single_round(&self) {
        publish_finished(
            self.events.as_deref(),
            Termination::Completed,
            1,
            u64::from(self.prompt_response.token_usage),
        );
    }

    fn finish_tool_call(
        &self,
        call: &ToolCall,
        outcome: std::result::Result<String, ToolError>,
        started: Instant,
    ) -> ToolResult {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = ToolResult::from_outcome(call, outcome);

        if result.is_error {
            warn!(tool = %call.name, call_id = %call.id, output = %result.output, "Tool call failed");
        } else {
            debug!(tool = %call.name, call_id = %call.id, duration_ms, "Tool call resolved");
        }

        if let Some(bus) = &self.events {
            bus.publish(ResolutionEvent::ToolExecuted {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                success: !result.is_error,
                duration_ms,
                timestamp: Utc::now(),
            });
        }
        result
    }
}

/// Log the end of a resolution and publish `ResolutionFinished` if a bus is
/// attached.
pub(crate) fn publish_finished(
    events: Option<&EventBus>,
    termination: Termination,
    rounds: u32,
    tokens_used: u64,
) {
    info!(%termination, rounds, tokens_used, "Resolution finished");
    if let Some(bus) = events {
        bus.publish(ResolutionEvent::ResolutionFinished {
            termination,
            rounds,
            tokens_used,
            timestamp: Utc::now(),
        });
    }
}
