//! Registry entries and the change events they produce.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Conversation, Message};
use crate::util::path_key;

/// Stable handle for a registry entry.
///
/// Assigned when a document is first inserted and never reused, so it stays
/// valid while the entry moves around in the ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryId(pub(crate) u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A known conversation document plus its query-only state.
#[derive(Debug, Clone)]
pub struct LogEntry {
    id: EntryId,
    path: PathBuf,
    key: String,
    conversation: Conversation,
    match_flags: Vec<bool>,
    visible: bool,
}

impl LogEntry {
    pub(crate) fn new(id: EntryId, path: &Path, conversation: Conversation) -> Self {
        let len = conversation.len();
        Self {
            id,
            path: path.to_path_buf(),
            key: path_key(path),
            conversation,
            match_flags: vec![false; len],
            visible: true,
        }
    }

    /// Entry handle.
    #[must_use]
    pub const fn id(&self) -> EntryId {
        self.id
    }

    /// Source file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Case-insensitive path key used for identity and tie-breaking.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The parsed document.
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Messages in chronological order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// When the conversation started.
    #[must_use]
    pub const fn started(&self) -> DateTime<Utc> {
        self.conversation.started
    }

    /// Whether the message at `index` matches the active filter.
    #[must_use]
    pub fn is_match(&self, index: usize) -> bool {
        self.match_flags.get(index).copied().unwrap_or(false)
    }

    /// Per-message filter flags, parallel to [`Self::messages`].
    #[must_use]
    pub fn match_flags(&self) -> &[bool] {
        &self.match_flags
    }

    /// Indices of matching messages in message order.
    pub fn match_indices(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.match_flags
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
    }

    /// Number of matching messages.
    #[must_use]
    pub fn match_count(&self) -> usize {
        self.match_flags.iter().filter(|&&m| m).count()
    }

    /// Whether the document passes the active filter.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_filter_result(&mut self, flags: Vec<bool>, visible: bool) {
        debug_assert_eq!(flags.len(), self.conversation.len());
        self.match_flags = flags;
        self.visible = visible;
    }

    /// Swap in a reloaded document, returning how the message list changed.
    pub(crate) fn replace_conversation(&mut self, conversation: Conversation) -> MessageDiff {
        let diff = MessageDiff::between(self.conversation.messages(), conversation.messages());
        self.match_flags = vec![false; conversation.len()];
        self.visible = true;
        self.conversation = conversation;
        diff
    }
}

/// How a reload changed a document's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageDiff {
    /// Leading messages identical in the old and new lists.
    pub retained: usize,
    /// Messages in the new list past the retained prefix.
    pub added: usize,
    /// Messages in the old list past the retained prefix.
    pub dropped: usize,
}

impl MessageDiff {
    fn between(old: &[Message], new: &[Message]) -> Self {
        let retained = old.iter().zip(new).take_while(|(a, b)| a == b).count();
        Self {
            retained,
            added: new.len() - retained,
            dropped: old.len() - retained,
        }
    }

    /// Whether the reload only appended messages.
    #[must_use]
    pub const fn is_append_only(&self) -> bool {
        self.dropped == 0
    }

    /// Whether nothing changed.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        self.added == 0 && self.dropped == 0
    }
}

/// Structured change notification emitted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A new document was inserted at `index`.
    Inserted {
        /// Entry handle.
        id: EntryId,
        /// Position in registry order.
        index: usize,
    },
    /// A known document was reloaded in place.
    Updated {
        /// Entry handle.
        id: EntryId,
        /// Position in registry order.
        index: usize,
        /// Message-level change.
        diff: MessageDiff,
    },
    /// A reloaded document moved because its start time changed.
    Reordered {
        /// Entry handle.
        id: EntryId,
        /// Old position.
        from: usize,
        /// New position.
        to: usize,
    },
    /// A document was removed.
    Removed {
        /// Entry handle.
        id: EntryId,
        /// Position it occupied.
        index: usize,
        /// Source file path.
        path: PathBuf,
    },
    /// The current document changed.
    SelectionChanged {
        /// New current entry, if any.
        id: Option<EntryId>,
    },
}

/// Result of inserting or reloading one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The path was new.
    Inserted {
        /// Entry handle.
        id: EntryId,
        /// Position in registry order.
        index: usize,
    },
    /// The path was known and its document reloaded.
    Updated {
        /// Entry handle.
        id: EntryId,
        /// Position in registry order after the reload.
        index: usize,
        /// Message-level change.
        diff: MessageDiff,
    },
}

impl UpsertOutcome {
    /// Entry handle for either case.
    #[must_use]
    pub const fn id(&self) -> EntryId {
        match self {
            Self::Inserted { id, .. } | Self::Updated { id, .. } => *id,
        }
    }
}
