//! Wire Types
//!
//! Messages exchanged with the chat endpoint. These are the shapes that go
//! over the wire as JSON, so field names follow the endpoint's conventions
//! (`conversationId`), not Rust's.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The person typing into the client
    User,
    /// The remote assistant
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the message log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Server-issued conversation identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Body of the send request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full history up to and including the newly submitted user message
    pub messages: Vec<ChatMessage>,
    /// Current conversation id, `null` on the first turn
    #[serde(rename = "conversationId")]
    pub conversation_id: Option<ConversationId>,
}

/// Body of the terminate request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndConversationRequest {
    /// Conversation to end
    #[serde(rename = "conversationId")]
    pub conversation_id: ConversationId,
}
