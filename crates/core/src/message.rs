//! Message domain types.
//!
//! A [`Message`] is one turn of a conversation. Messages are plain values:
//! once built they are never changed, only collected into a
//! [`Context`](crate::context::Context).

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The language model
    Model,
    /// Legacy function-call output
    Function,
    /// System instructions
    System,
    /// Aggregated tool execution results
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Function => "function",
            Self::System => "system",
            Self::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// The media type of a message's content.
///
/// Only text exists today; further media types will be added as variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ContentType {
    #[default]
    Text,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The message body
    pub content: String,

    /// How `content` should be interpreted
    #[serde(default)]
    pub content_type: ContentType,
}

impl Message {
    /// Create a text message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            content_type: ContentType::Text,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new model message.
    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool-result message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    pub fn function(content: impl Into<String>) -> Self {
        Self::new(Role::Function, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, model!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, model!");
        assert_eq!(msg.content_type, ContentType::Text);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::tool("42\n")).unwrap();
        assert!(json.contains(r#""role":"tool""#));
        assert!(json.contains(r#""content_type":"text""#));
    }

    #[test]
    fn content_type_defaults_to_text_when_absent() {
        let msg: Message = serde_json::from_str(r#"{"role":"model","content":"hi"}"#).unwrap();
        assert_eq!(msg, Message::model("hi"));
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Model.to_string(), "model");
        assert_eq!(Role::Function.to_string(), "function");
    }
}
