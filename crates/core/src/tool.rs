//! Tool descriptors offered to the model, and the resolvers that answer calls.
//!
//! The core never runs tool business logic itself. It hands each
//! [`ToolCall`] to a [`ToolResolver`] supplied by the caller and records the
//! returned text in the conversation.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::argument::ArgumentValue;
use crate::error::ToolError;

/// Describes a capability offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// The tool name the model refers to in calls
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub schema: ArgumentValue,

    /// Whether the model is expected to use this tool
    #[serde(default)]
    pub required: bool,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ArgumentValue,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A model-issued request to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the provider's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Structured arguments
    pub arguments: ArgumentValue,
}

impl ToolCall {
    /// Create a call with a freshly minted id, for backends that do not
    /// assign call ids themselves.
    pub fn new(name: impl Into<String>, arguments: ArgumentValue) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: ArgumentValue,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The outcome of one tool call, before results are concatenated into the
/// tool-result message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that was called
    pub name: String,

    /// Tool output, or the rendered failure text
    pub output: String,

    /// Whether `output` describes a failure
    pub is_error: bool,
}

impl ToolResult {
    /// Build the result for a finished call. Failures are rendered inline so
    /// the model can see them on its next turn.
    pub fn from_outcome(call: &ToolCall, outcome: Result<String, ToolError>) -> Self {
        match outcome {
            Ok(output) => Self {
                call_id: call.id.clone(),
                name: call.name.clone(),
                output,
                is_error: false,
            },
            Err(err) => Self {
                call_id: call.id.clone(),
                name: call.name.clone(),
                output: format!("Error in tool call {} of {}: {}", call.id, call.name, err),
                is_error: true,
            },
        }
    }
}

/// Join tool results into the body of a single tool-role message: each
/// output followed by a newline, in call order.
pub fn concat_tool_output(results: &[ToolResult]) -> String {
    let mut out = String::new();
    for result in results {
        out.push_str(&result.output);
        out.push('\n');
    }
    out
}

/// Answers tool calls on behalf of the resolution engine.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    /// Run one call and return its textual result.
    async fn resolve(&self, call: &ToolCall) -> std::result::Result<String, ToolError>;
}

/// A [`ToolResolver`] backed by an async closure.
pub struct ToolFn<F>(F);

/// Wrap an async closure `Fn(ToolCall) -> impl Future<Output = Result<String, ToolError>>`.
pub fn tool_fn<F, Fut>(f: F) -> ToolFn<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
{
    ToolFn(f)
}

#[async_trait]
impl<F, Fut> ToolResolver for ToolFn<F>
where
    F: Fn(ToolCall) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
{
    async fn resolve(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
        (self.0)(call.clone()).await
    }
}

/// A [`ToolResolver`] backed by a synchronous closure.
pub struct SyncToolFn<F>(F);

/// Wrap a synchronous closure `Fn(&ToolCall) -> Result<String, ToolError>`.
pub fn sync_tool_fn<F>(f: F) -> SyncToolFn<F>
where
    F: Fn(&ToolCall) -> std::result::Result<String, ToolError> + Send + Sync,
{
    SyncToolFn(f)
}

#[async_trait]
impl<F> ToolResolver for SyncToolFn<F>
where
    F: Fn(&ToolCall) -> std::result::Result<String, ToolError> + Send + Sync,
{
    async fn resolve(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
        (self.0)(call)
    }
}

/// The business logic behind one named tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The descriptor sent to the model. Its `name` is the dispatch key.
    fn descriptor(&self) -> Tool;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: &ArgumentValue) -> std::result::Result<String, ToolError>;
}

/// A registry of tool handlers, dispatched by name.
///
/// The registry is itself a [`ToolResolver`], so it can be handed straight to
/// the resolution strategies; [`ToolRegistry::descriptors`] yields the tool
/// list to send alongside the context.
pub struct ToolRegistry {
    handlers: HashMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler. Replaces any existing handler with the same name.
    pub fn register(&mut self, handler: Box<dyn ToolHandler>) {
        let name = handler.descriptor().name;
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    /// All tool descriptors, sorted by name for a stable request shape.
    pub fn descriptors(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.handlers.values().map(|h| h.descriptor()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolResolver for ToolRegistry {
    async fn resolve(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        handler.execute(&call.arguments).await
    }
}
