//! Conversation messages and per-user context state.
//!
//! A [`ConversationContext`] is the unit of per-user memory: an append-only
//! ordered sequence of [`Message`]s plus an activity timestamp. Contexts are
//! owned exclusively by the context store; this crate only defines the shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in a conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Whether this is a system message.
    pub fn is_system(&self) -> bool {
        self.role == MessageRole::System
    }
}

/// Per-user conversational memory.
///
/// Invariants (enforced by the context store, not by this type):
/// - at most one system message, and if present it sits at position 0;
/// - non-system messages never exceed the configured window size;
/// - `last_activity` is monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub user_id: String,
    pub messages: Vec<Message>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationContext {
    /// Create an empty context for a user, stamped with the current time.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            messages: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    /// Count of non-system messages.
    pub fn conversation_len(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_system()).count()
    }
}

/// Summary of a context returned by the info operation.
///
/// `last_activity` is `None` when no context exists for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextInfo {
    pub message_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ContextInfo {
    /// Info for an absent context.
    pub fn empty() -> Self {
        Self {
            message_count: 0,
            last_activity: None,
        }
    }
}
