//! The combined registry, filter and navigator state behind one lock.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ChatlogError, Result};
use crate::filter::FilterState;
use crate::model::{Conversation, Direction};
use crate::navigator::{Cursor, Navigator, SearchDirection};
use crate::registry::{EntryId, LogEntry, LogRegistry, ReconcileReport, UpsertOutcome};
use crate::store::DocumentStore;
use crate::util::paths_equal;

/// Counts shown in the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    /// Number of documents.
    pub conversations: usize,
    /// Messages across all documents.
    pub messages: usize,
    /// Flagged messages, present only while a filter is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_matches: Option<usize>,
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conversations, {} messages", self.conversations, self.messages)?;
        if let Some(matches) = self.filter_matches {
            write!(f, ", {matches} filter matches")?;
        }
        Ok(())
    }
}

/// Display-ready message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    /// Index within the document.
    pub index: usize,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Incoming or outgoing.
    pub direction: Direction,
    /// Contact display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Message body.
    pub text: String,
    /// Whether the message matches the active filter.
    pub is_match: bool,
    /// Whether the navigation cursor is on this message.
    pub is_cursor: bool,
}

/// Display-ready document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    /// Entry handle.
    pub id: EntryId,
    /// Source file.
    pub path: PathBuf,
    /// Conversation identifier.
    pub conversation_id: String,
    /// "Conversation started ..." heading.
    pub title: String,
    /// Start time.
    pub started: DateTime<Utc>,
    /// Whether this is the current document.
    pub is_current: bool,
    /// Whether the document passes the active filter.
    pub is_visible: bool,
    /// Flagged messages in this document.
    pub match_count: usize,
    /// Messages in order.
    pub messages: Vec<MessageView>,
}

/// A consistent, owned copy of the whole view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    /// Active filter text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Current document.
    pub current: Option<EntryId>,
    /// Navigation cursor.
    pub cursor: Option<Cursor>,
    /// Status line counts.
    pub status: StatusSummary,
    /// Documents in registry order.
    pub documents: Vec<DocumentView>,
}

impl ViewSnapshot {
    /// Documents that pass the filter.
    pub fn visible(&self) -> impl Iterator<Item = &DocumentView> {
        self.documents.iter().filter(|d| d.is_visible)
    }

    /// The current document.
    #[must_use]
    pub fn current_document(&self) -> Option<&DocumentView> {
        self.current
            .and_then(|id| self.documents.iter().find(|d| d.id == id))
    }

    /// The message under the cursor.
    #[must_use]
    pub fn cursor_message(&self) -> Option<&MessageView> {
        let cursor = self.cursor?;
        self.documents
            .iter()
            .find(|d| d.id == cursor.entry)?
            .messages
            .get(cursor.message)
    }
}

/// Registry, filter and navigator, mutated together.
///
/// After every mutation the state is settled: a non-empty registry always
/// has a current document, and while a filter is active the cursor sits on
/// a match whenever one exists.
#[derive(Debug)]
pub struct ViewState {
    registry: LogRegistry,
    filter: FilterState,
    navigator: Navigator,
}

impl ViewState {
    /// Empty state loading through `store`.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self {
            registry: LogRegistry::new(store),
            filter: FilterState::new(),
            navigator: Navigator::new(),
        }
    }

    /// The underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &LogRegistry {
        &self.registry
    }

    /// Mutable registry access, for subscribing to its events.
    pub fn registry_mut(&mut self) -> &mut LogRegistry {
        &mut self.registry
    }

    /// The filter state.
    #[must_use]
    pub const fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// The navigation cursor.
    #[must_use]
    pub const fn cursor(&self) -> Option<Cursor> {
        self.navigator.cursor()
    }

    /// Load all `paths` (startup).
    pub fn reconcile<I, P>(&mut self, paths: I) -> ReconcileReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let report = self.registry.reconcile(paths);
        self.filter.apply_all(&mut self.registry);
        self.settle();
        report
    }

    /// Load `path` and insert or reload it.
    pub fn upsert(&mut self, path: &Path) -> Result<Option<UpsertOutcome>> {
        let loaded = self.registry.store().load(path);
        self.apply_loaded(path, loaded)
    }

    /// Apply the result of a load performed elsewhere.
    ///
    /// A vanished file is a no-op; other load failures are returned without
    /// touching the state.
    pub fn apply_loaded(&mut self, path: &Path, loaded: Result<Conversation>) -> Result<Option<UpsertOutcome>> {
        let conversation = match loaded {
            Ok(conversation) => conversation,
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "file vanished before it could be loaded");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let outcome = self.registry.upsert_loaded(path, conversation);
        let id = outcome.id();
        if let Some(entry) = self.registry.get_mut(id) {
            self.filter.apply_to(entry);
        }

        if let UpsertOutcome::Updated { diff, .. } = outcome {
            // Messages past the unchanged prefix were replaced; an index into
            // them no longer names the same message.
            if self
                .navigator
                .cursor()
                .is_some_and(|c| c.entry == id && c.message >= diff.retained)
            {
                self.navigator.clear();
            }
        }

        self.settle();
        Ok(Some(outcome))
    }

    /// Remove the entry for `path`. Returns whether anything was removed.
    pub fn remove(&mut self, path: &Path) -> bool {
        let Some(entry) = self.registry.remove(path) else {
            return false;
        };
        self.navigator.purge(entry.id());
        self.settle();
        true
    }

    /// Apply a rename whose new path has already been loaded.
    ///
    /// If the old path was current, the renamed document becomes current and
    /// the cursor moves with it when its message still exists.
    pub fn apply_rename(&mut self, from: &Path, to: &Path, loaded: Result<Conversation>) -> Result<Option<UpsertOutcome>> {
        let was_current = self
            .registry
            .current_entry()
            .is_some_and(|e| paths_equal(e.path(), from));
        let cursor_message = self
            .navigator
            .cursor()
            .filter(|_| was_current)
            .map(|c| c.message);

        if let Some(entry) = self.registry.remove(from) {
            self.navigator.purge(entry.id());
        }

        let result = self.apply_loaded(to, loaded);

        if was_current {
            if let Some(id) = self.registry.find_by_path(to).map(LogEntry::id) {
                self.registry.select(id);
                let restored = cursor_message.is_some_and(|message| {
                    let on_match = !self.filter.is_active()
                        || self.registry.get(id).is_some_and(|e| e.is_match(message));
                    on_match && self.navigator.place(&mut self.registry, Cursor { entry: id, message })
                });
                if !restored {
                    self.navigator.purge(id);
                }
            }
        }
        // The new path may have failed to load after the old entry was gone.
        self.settle();
        result
    }

    /// Load `to` and apply a rename from `from`.
    pub fn rename(&mut self, from: &Path, to: &Path) -> Result<Option<UpsertOutcome>> {
        let loaded = self.registry.store().load(to);
        self.apply_rename(from, to, loaded)
    }

    /// Set the filter text, re-flag every document and advance forward.
    pub fn set_filter(&mut self, text: &str) -> Option<Cursor> {
        if !self.filter.set(text) {
            return self.navigator.cursor();
        }
        if !self.filter.is_active() {
            return self.clear_filter();
        }
        self.filter.apply_all(&mut self.registry);
        self.navigator.advance(SearchDirection::Forward, &mut self.registry)
    }

    /// Clear the filter, its flags and the cursor.
    pub fn clear_filter(&mut self) -> Option<Cursor> {
        self.filter.clear();
        self.filter.apply_all(&mut self.registry);
        self.navigator.clear();
        None
    }

    /// Move to the next match in `direction`.
    pub fn advance(&mut self, direction: SearchDirection) -> Option<Cursor> {
        self.navigator.advance(direction, &mut self.registry)
    }

    /// Make `id` current. The cursor is dropped if it was in another document.
    pub fn select(&mut self, id: EntryId) -> bool {
        if !self.registry.select(id) {
            return false;
        }
        if self.navigator.cursor().is_some_and(|c| c.entry != id) {
            self.navigator.clear();
        }
        true
    }

    /// Put the cursor on a message, making its document current.
    pub fn select_message(&mut self, id: EntryId, message: usize) -> bool {
        self.navigator.place(&mut self.registry, Cursor { entry: id, message })
    }

    /// Restore the settled invariants after a mutation.
    fn settle(&mut self) {
        if self.registry.current().is_none() && !self.registry.is_empty() {
            self.registry.select_first();
        }

        let valid = self.navigator.revalidate(&self.registry);
        if self.filter.is_active() {
            let on_match = valid
                && self
                    .navigator
                    .cursor()
                    .is_some_and(|c| self.registry.get(c.entry).is_some_and(|e| e.is_match(c.message)));
            if !on_match {
                self.navigator.clear();
                if self.navigator.advance(SearchDirection::Forward, &mut self.registry).is_none() {
                    debug!(filter = %self.filter.text(), "no matches after change");
                }
            }
        }
    }

    /// Status line counts.
    #[must_use]
    pub fn status(&self) -> StatusSummary {
        StatusSummary {
            conversations: self.registry.len(),
            messages: self.registry.total_messages(),
            filter_matches: self
                .filter
                .is_active()
                .then(|| FilterState::match_count(&self.registry)),
        }
    }

    /// Owned copy of everything a presentation layer needs.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let current = self.registry.current();
        let cursor = self.navigator.cursor();

        let documents = self
            .registry
            .entries()
            .iter()
            .map(|entry| DocumentView {
                id: entry.id(),
                path: entry.path().to_path_buf(),
                conversation_id: entry.conversation().id.clone(),
                title: entry.conversation().title(),
                started: entry.started(),
                is_current: current == Some(entry.id()),
                is_visible: entry.is_visible(),
                match_count: entry.match_count(),
                messages: entry
                    .messages()
                    .iter()
                    .enumerate()
                    .map(|(index, m)| MessageView {
                        index,
                        timestamp: m.timestamp(),
                        direction: m.direction(),
                        contact: m.contact().map(str::to_string),
                        text: m.text().to_string(),
                        is_match: entry.is_match(index),
                        is_cursor: cursor == Some(Cursor { entry: entry.id(), message: index }),
                    })
                    .collect(),
            })
            .collect();

        ViewSnapshot {
            filter: self.filter.is_active().then(|| self.filter.text().to_string()),
            current,
            cursor,
            status: self.status(),
            documents,
        }
    }

    /// Log a load failure the way the consumer does.
    pub(crate) fn report_failure(path: &Path, error: &ChatlogError) {
        warn!(path = %path.display(), error = %error, "failed to apply change");
    }
}
