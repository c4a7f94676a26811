//! UI-agnostic conversation state
//!
//! The message types and the append-only conversation store live here so that
//! any front end can own a `Conversation` without depending on a UI framework.

use serde::{Deserialize, Serialize};

/// A chat message in the agent conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Image URLs attached to an assistant reply. Always empty for user messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Set on the assistant message that reports a failed turn.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: Vec::new(),
            failed: false,
        }
    }

    pub fn assistant(content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            images,
            failed: false,
        }
    }

    /// Assistant message standing in for a reply that could not be fetched.
    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            failed: true,
            ..Self::assistant(content, Vec::new())
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

/// Ordered, append-only list of messages for one session.
///
/// Entries are never edited or removed; insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
