//! Individual instant messages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatlogError;

/// Whether a message was received or sent by the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Message received from another participant.
    #[default]
    Incoming,
    /// Message sent by the local user.
    Outgoing,
}

impl Direction {
    /// Name used in the persisted format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incoming => "Incoming",
            Self::Outgoing => "Outgoing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ChatlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Incoming" | "incoming" | "0" => Ok(Self::Incoming),
            "Outgoing" | "outgoing" | "1" => Ok(Self::Outgoing),
            other => Err(ChatlogError::InvalidArgument {
                name: "direction".to_string(),
                reason: format!("unknown message direction '{other}'"),
            }),
        }
    }
}

/// A single message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    timestamp: DateTime<Utc>,
    direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_email: Option<String>,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<String>,
}

impl Message {
    /// Create a message. The body is trimmed.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, direction: Direction, text: impl AsRef<str>) -> Self {
        Self {
            timestamp,
            direction,
            contact: None,
            contact_email: None,
            text: text.as_ref().trim().to_string(),
            attachment: None,
        }
    }

    /// Set the contact display name and address.
    #[must_use]
    pub fn with_contact(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.contact = name.filter(|n| !n.is_empty());
        self.contact_email = email.filter(|e| !e.is_empty());
        self
    }

    /// Set the attachment reference.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Option<String>) -> Self {
        self.attachment = attachment.filter(|a| !a.is_empty());
        self
    }

    /// When the message was captured.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Incoming or outgoing.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Contact display name.
    #[must_use]
    pub fn contact(&self) -> Option<&str> {
        self.contact.as_deref()
    }

    /// Contact address.
    #[must_use]
    pub fn contact_email(&self) -> Option<&str> {
        self.contact_email.as_deref()
    }

    /// Trimmed message body.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attachment reference, if any.
    #[must_use]
    pub fn attachment(&self) -> Option<&str> {
        self.attachment.as_deref()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.contact.as_deref().unwrap_or("unknown"),
            self.text
        )
    }
}
