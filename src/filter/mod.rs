//! Filter engine: free-text search over conversation messages.
//!
//! A message matches when its body or its contact display name contains the
//! filter text, ignoring case. Results come in two levels:
//!
//! - **Document level**: whether the conversation is shown at all. With an
//!   empty filter every document passes.
//! - **Message level**: a per-message flag used for highlighting and for
//!   navigation. With an empty filter no message is flagged.
//!
//! Flags are always recomputed from the documents and the filter text; they
//! are never patched incrementally.

use tracing::debug;

use crate::model::Message;
use crate::registry::{LogEntry, LogRegistry};

/// Whether `message` matches an already-lowercased, non-empty needle.
#[must_use]
pub fn message_matches(message: &Message, needle_lower: &str) -> bool {
    message.text().to_lowercase().contains(needle_lower)
        || message
            .contact()
            .is_some_and(|c| c.to_lowercase().contains(needle_lower))
}

/// Evaluate `filter_text` against one entry, setting its message flags.
///
/// Returns the document-level result.
pub fn matches(entry: &mut LogEntry, filter_text: &str) -> bool {
    if filter_text.is_empty() {
        let len = entry.messages().len();
        entry.set_filter_result(vec![false; len], true);
        return true;
    }

    let needle = filter_text.to_lowercase();
    let flags: Vec<bool> = entry
        .messages()
        .iter()
        .map(|m| message_matches(m, &needle))
        .collect();
    let visible = flags.iter().any(|&f| f);
    entry.set_filter_result(flags, visible);
    visible
}

/// The active filter text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    text: String,
}

impl FilterState {
    /// No filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The filter text; empty when inactive.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether a filter is set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.text.is_empty()
    }

    /// Replace the filter text. Returns `true` if it changed.
    pub fn set(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.text {
            return false;
        }
        self.text = text;
        true
    }

    /// Clear the filter text. Returns `true` if it changed.
    pub fn clear(&mut self) -> bool {
        self.set(String::new())
    }

    /// Re-evaluate every entry in `registry`.
    pub fn apply_all(&self, registry: &mut LogRegistry) {
        let mut visible = 0usize;
        for entry in registry.entries_mut() {
            if matches(entry, &self.text) {
                visible += 1;
            }
        }
        debug!(filter = %self.text, visible, "applied filter");
    }

    /// Re-evaluate a single entry.
    pub fn apply_to(&self, entry: &mut LogEntry) -> bool {
        matches(entry, &self.text)
    }

    /// Flagged messages across the registry.
    #[must_use]
    pub fn match_count(registry: &LogRegistry) -> usize {
        registry.entries().iter().map(LogEntry::match_count).sum()
    }

    /// Entries that pass the filter.
    #[must_use]
    pub fn visible_count(registry: &LogRegistry) -> usize {
        registry.entries().iter().filter(|e| e.is_visible()).count()
    }
}
