//! Synthetic conversation log generators.
//!
//! Builds conversation documents and writes them into a folder the same way
//! the capture process does, for use by the integration tests and benches.

#![allow(dead_code)]

use chatlog_watch::model::{Conversation, Direction, Message};
use chatlog_watch::store::DocumentStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// Configuration for generating a synthetic conversation.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// External conversation identifier.
    pub id: String,
    /// Number of messages.
    pub messages: usize,
    /// Participants cycled through as senders.
    pub contacts: Vec<String>,
    /// When the conversation started.
    pub started: DateTime<Utc>,
    /// Every `needle_every`th message contains `needle`.
    pub needle_every: usize,
    /// Marker text for filter tests.
    pub needle: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            id: "conversation".to_string(),
            messages: 10,
            contacts: vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()],
            started: base_time(),
            needle_every: 4,
            needle: "needle".to_string(),
        }
    }
}

impl ConversationConfig {
    /// A config with the given id and start offset in minutes from [`base_time`].
    pub fn named(id: &str, minutes: i64) -> Self {
        Self {
            id: id.to_string(),
            started: base_time() + Duration::minutes(minutes),
            ..Default::default()
        }
    }
}

/// A fixed reference time so generated data is reproducible.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

/// Build a conversation from `config`.
pub fn generate_conversation(config: &ConversationConfig) -> Conversation {
    let messages = (0..config.messages)
        .map(|i| {
            let contact = &config.contacts[i % config.contacts.len()];
            let direction = if i % 2 == 0 { Direction::Incoming } else { Direction::Outgoing };
            let text = if config.needle_every > 0 && i % config.needle_every == 0 {
                format!("message {i} mentions the {}", config.needle)
            } else {
                format!("message {i} about nothing in particular")
            };
            Message::new(config.started + Duration::seconds(i as i64 * 30), direction, text)
                .with_contact(Some(contact.clone()), None)
        })
        .collect();
    Conversation::from_parts(config.id.clone(), config.started, messages)
}

/// Write a conversation for `config` into `folder`, returning its path.
pub fn write_conversation(store: &DocumentStore, folder: &Path, config: &ConversationConfig) -> PathBuf {
    let path = store.path_for(folder, &config.id);
    store
        .save(&generate_conversation(config), &path)
        .unwrap_or_else(|e| panic!("Failed to write {}: {e}", path.display()));
    path
}

/// Write `count` conversations started one minute apart.
pub fn populate_folder(store: &DocumentStore, folder: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| write_conversation(store, folder, &ConversationConfig::named(&format!("conv-{i:03}"), i as i64)))
        .collect()
}
