//! # Palaver Core
//!
//! A provider-agnostic conversation layer for LLMs. It owns the message
//! history, talks to any backend through the [`BatchAdapter`] and
//! [`StreamAdapter`] traits, and resolves what the model asks for (plain
//! replies or tool calls) into the next [`Context`].
//!
//! ## Shape of an exchange
//!
//! ```text
//! Context --send--> PendingResponse --resolve*--> Context
//! ```
//!
//! Contexts are immutable values: every operation returns a new one, and a
//! context handed to an adapter cannot be changed by it. Streaming responses
//! are folded by [`aggregate`] into the same [`PromptResponse`] a batch
//! adapter returns, so resolution never needs to know how the reply arrived.

pub mod aggregate;
pub mod argument;
pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod pending;
pub mod provider;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export key types at crate root for ergonomics
pub use aggregate::{StreamAggregator, aggregate};
pub use argument::ArgumentValue;
pub use context::{Context, DEFAULT_MAX_TOKENS, SendOptions};
pub use error::{AdapterError, ArgumentError, Error, Result, ToolError};
pub use event::{EventBus, ResolutionEvent, Termination};
pub use message::{ContentType, Message, Role};
pub use pending::{DEFAULT_MAX_DEPTH, DEFAULT_TOKEN_BUDGET, PendingResponse, ResolutionLimits};
pub use provider::{
    AdapterRequest, BatchAdapter, DeltaStream, PromptResponse, PromptResponseDelta, StopReason,
    StreamAdapter, batch_fn, delta_stream_from_receiver, stream_fn,
};
pub use tool::{
    Tool, ToolCall, ToolHandler, ToolRegistry, ToolResolver, ToolResult, concat_tool_output,
    sync_tool_fn, tool_fn,
};
