//! Dialogue records kept in a session log.

use chrono::{DateTime, NaiveDateTime, Utc};
use notewise_ai::{Message, Role};
use serde::{Deserialize, Serialize};

/// Marker that opens the system message carrying a rolled-up summary.
pub const SUMMARY_PREFIX: &str = "Conversation summary:\n";

/// Author of a stored message.
///
/// Stored as `human` / `ai` / `system`; `user` and `assistant` are accepted
/// on read. Any other value makes the record unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "human", alias = "user")]
    User,
    #[serde(rename = "ai", alias = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
}

impl MessageRole {
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
            MessageRole::System => "System",
        }
    }
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
            MessageRole::System => Role::System,
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
            Role::System => MessageRole::System,
        }
    }
}

/// One message of a conversation. Never modified after it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// An assistant reply closes one round.
    pub fn is_round(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    pub fn to_llm(&self) -> Message {
        Message {
            role: self.role.into(),
            content: self.content.clone(),
        }
    }
}

/// Rolled-up digest of every message cut from a session so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Summary {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// The summary as it appears at the head of the effective history.
    pub fn to_system_message(&self) -> ChatMessage {
        ChatMessage::system(format!("{SUMMARY_PREFIX}{}", self.content))
            .with_timestamp(self.timestamp)
    }
}

/// Parse a stored timestamp. Accepts RFC 3339 and naive ISO-8601 (read as UTC).
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
