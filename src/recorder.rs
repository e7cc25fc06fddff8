//! Writing side of the log folder: append captured messages to a
//! conversation's file.
//!
//! Each recorded message is one complete load, append and save cycle. The
//! file on disk is re-read before appending so that another writer's
//! messages are kept, and the save is atomic so watchers never observe a
//! half-written document.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{ChatlogError, Result};
use crate::model::{Conversation, Direction, Message};
use crate::store::DocumentStore;
use crate::util::generate_conversation_id;

/// A message as captured from the chat client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Sender display name.
    pub contact: Option<String>,
    /// Sender e-mail address.
    pub contact_email: Option<String>,
    /// Incoming or outgoing.
    pub direction: Direction,
    /// Body; trimmed before storing.
    pub text: String,
    /// Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    /// Attachment reference.
    pub attachment: Option<String>,
}

impl NewMessage {
    /// An incoming message from `contact`.
    pub fn new(contact: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            contact: Some(contact.into()),
            contact_email: None,
            direction: Direction::Incoming,
            text: text.into(),
            timestamp: None,
            attachment: None,
        }
    }

    /// Set the direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the contact e-mail.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = Some(email.into());
        self
    }
}

/// Appends messages to one conversation's log file.
#[derive(Debug)]
pub struct ConversationRecorder {
    store: DocumentStore,
    path: PathBuf,
    conversation: Conversation,
}

impl ConversationRecorder {
    /// Open the log for `external_id` in `folder`, creating the folder if needed.
    ///
    /// An existing file is loaded; otherwise a new conversation starts now.
    pub fn open(store: DocumentStore, folder: &Path, external_id: &str) -> Result<Self> {
        if !folder.exists() {
            std::fs::create_dir_all(folder)
                .map_err(|e| ChatlogError::io(format!("Failed to create log folder: {}", folder.display()), e))?;
        }

        let path = store.path_for(folder, external_id);
        let conversation = match store.load(&path) {
            Ok(conversation) => conversation,
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "starting new conversation log");
                Conversation::new(generate_conversation_id(external_id))
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            store,
            path,
            conversation,
        })
    }

    /// The log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The conversation as last saved.
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Append `message` and save.
    ///
    /// Returns `false` without touching the file when the trimmed text is
    /// empty.
    pub fn record(&mut self, message: NewMessage) -> Result<bool> {
        let text = message.text.trim();
        if text.is_empty() {
            debug!("ignoring empty message");
            return Ok(false);
        }

        let mut conversation = match self.store.load(&self.path) {
            Ok(on_disk) => on_disk,
            Err(e) if e.is_not_found() => self.conversation.clone(),
            Err(e) => return Err(e),
        };

        let built = Message::new(message.timestamp.unwrap_or_else(Utc::now), message.direction, text)
            .with_contact(message.contact, message.contact_email)
            .with_attachment(message.attachment);
        info!(conversation = %conversation.id, "{built}");
        conversation.push(built);

        self.store.save(&conversation, &self.path)?;
        self.conversation = conversation;
        Ok(true)
    }
}
