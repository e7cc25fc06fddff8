//! Conversation documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// One conversation log: identifier, start time and ordered messages.
///
/// Messages are kept sorted non-decreasing by timestamp. Ties keep the order
/// in which the messages were supplied, and exact adjacent duplicates are
/// dropped when a conversation is assembled from persisted records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable conversation identifier.
    pub id: String,
    /// When the conversation started.
    pub started: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a new, empty conversation now.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_started(id, Utc::now())
    }

    /// Start a new, empty conversation at a given time.
    #[must_use]
    pub fn with_started(id: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            started,
            messages: Vec::new(),
        }
    }

    /// Assemble a conversation from persisted parts, normalizing the message order.
    #[must_use]
    pub fn from_parts(id: impl Into<String>, started: DateTime<Utc>, messages: Vec<Message>) -> Self {
        let mut conversation = Self {
            id: id.into(),
            started,
            messages,
        };
        conversation.normalize();
        conversation
    }

    /// Messages in chronological order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Human-readable title.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Conversation started {}", self.started.format("%Y-%m-%d %H:%M:%S"))
    }

    /// Append a message, keeping the timestamp order.
    ///
    /// A message older than the current tail is placed after every message
    /// with an equal or earlier timestamp.
    pub fn push(&mut self, message: Message) {
        let at = self
            .messages
            .partition_point(|m| m.timestamp() <= message.timestamp());
        self.messages.insert(at, message);
    }

    /// Sort by timestamp (stable) and drop exact adjacent duplicates.
    pub fn normalize(&mut self) {
        self.messages.sort_by_key(Message::timestamp);
        self.messages.dedup();
    }
}
