//! The log registry: the authoritative, ordered set of known conversations.
//!
//! Entries are kept ordered by start time, most recent first, with ties
//! broken by (case-insensitive) path so the order is deterministic. The
//! registry reconciles itself against file-system notifications:
//!
//! - [`LogRegistry::upsert`] inserts a new path at its sorted position, or
//!   reloads a known one in place so observers keep their selection.
//! - [`LogRegistry::remove`] drops a path; unknown paths are a no-op.
//! - [`LogRegistry::rename`] is a remove followed by an upsert, and either
//!   half may arrive on its own.
//!
//! Every mutation takes `&mut self`. Callers that share a registry across
//! threads wrap it in a lock so readers only ever see whole mutations.
//! Structural changes are published to subscribers as [`RegistryEvent`]s.

mod entry;

pub use entry::{EntryId, LogEntry, MessageDiff, RegistryEvent, UpsertOutcome};

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, info, warn};

use crate::error::{ChatlogError, Result};
use crate::model::Conversation;
use crate::store::DocumentStore;
use crate::util::path_key;

/// Outcome of a batch reconciliation.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Paths loaded and inserted or updated.
    pub loaded: usize,
    /// Paths that failed to load, with the error.
    pub failed: Vec<(PathBuf, ChatlogError)>,
}

impl ReconcileReport {
    /// Whether every path loaded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered collection of conversation documents.
#[derive(Debug)]
pub struct LogRegistry {
    store: DocumentStore,
    entries: Vec<LogEntry>,
    current: Option<EntryId>,
    next_id: u64,
    listeners: Vec<Sender<RegistryEvent>>,
}

impl LogRegistry {
    /// Create an empty registry that loads documents through `store`.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            entries: Vec::new(),
            current: None,
            next_id: 1,
            listeners: Vec::new(),
        }
    }

    /// The document store used for loads.
    #[must_use]
    pub const fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Entries in registry order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [LogEntry] {
        &mut self.entries
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total messages across all documents.
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.entries.iter().map(|e| e.conversation().len()).sum()
    }

    /// Look up an entry by handle.
    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut LogEntry> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    /// Position of an entry in registry order.
    #[must_use]
    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    /// Find an entry by path, ignoring case.
    #[must_use]
    pub fn find_by_path(&self, path: &Path) -> Option<&LogEntry> {
        let key = path_key(path);
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Find an entry by conversation id, file stem, or path.
    #[must_use]
    pub fn find(&self, query: &str) -> Option<&LogEntry> {
        self.entries
            .iter()
            .find(|e| e.conversation().id == query)
            .or_else(|| {
                self.entries.iter().find(|e| {
                    e.path()
                        .file_stem()
                        .is_some_and(|s| s.to_string_lossy().eq_ignore_ascii_case(query))
                })
            })
            .or_else(|| self.find_by_path(Path::new(query)))
    }

    /// Subscribe to structural change notifications.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: RegistryEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// The current (selected) entry, if any.
    #[must_use]
    pub const fn current(&self) -> Option<EntryId> {
        self.current
    }

    /// The current entry itself.
    #[must_use]
    pub fn current_entry(&self) -> Option<&LogEntry> {
        self.current.and_then(|id| self.get(id))
    }

    /// Make `id` current. Returns `false` if the entry does not exist.
    pub fn select(&mut self, id: EntryId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        if self.current != Some(id) {
            self.current = Some(id);
            self.emit(RegistryEvent::SelectionChanged { id: Some(id) });
        }
        true
    }

    /// Make the first entry current, or clear the selection if empty.
    pub fn select_first(&mut self) -> Option<EntryId> {
        match self.entries.first().map(LogEntry::id) {
            Some(id) => {
                self.select(id);
                Some(id)
            }
            None => {
                self.clear_selection();
                None
            }
        }
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        if self.current.take().is_some() {
            self.emit(RegistryEvent::SelectionChanged { id: None });
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Load every path and insert it in order.
    ///
    /// A path that fails to load is logged and skipped; the rest of the batch
    /// is still processed.
    pub fn reconcile<I, P>(&mut self, paths: I) -> ReconcileReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = ReconcileReport::default();
        for path in paths {
            let path = path.as_ref();
            match self.store.load(path) {
                Ok(conversation) => {
                    self.upsert_loaded(path, conversation);
                    report.loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping conversation file");
                    report.failed.push((path.to_path_buf(), e));
                }
            }
        }
        info!(
            loaded = report.loaded,
            failed = report.failed.len(),
            total = self.entries.len(),
            "reconciled conversation files"
        );
        report
    }

    /// Load `path` and insert or reload it.
    ///
    /// A path whose file has vanished is a no-op (`Ok(None)`), since the
    /// matching remove notification is on its way.
    pub fn upsert(&mut self, path: impl AsRef<Path>) -> Result<Option<UpsertOutcome>> {
        let path = path.as_ref();
        match self.store.load(path) {
            Ok(conversation) => Ok(Some(self.upsert_loaded(path, conversation))),
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "file vanished before it could be loaded");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert or reload a document that has already been loaded.
    pub fn upsert_loaded(&mut self, path: &Path, conversation: Conversation) -> UpsertOutcome {
        let key = path_key(path);
        match self.entries.iter().position(|e| e.key() == key) {
            Some(index) => self.reload_at(index, conversation),
            None => self.insert(path, conversation),
        }
    }

    fn insert(&mut self, path: &Path, conversation: Conversation) -> UpsertOutcome {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        let entry = LogEntry::new(id, path, conversation);
        let index = self.sorted_position(&entry);
        debug!(%id, index, path = %path.display(), "inserting conversation");
        self.entries.insert(index, entry);
        self.emit(RegistryEvent::Inserted { id, index });
        UpsertOutcome::Inserted { id, index }
    }

    fn reload_at(&mut self, index: usize, conversation: Conversation) -> UpsertOutcome {
        let started_changed = self.entries[index].started() != conversation.started;
        let diff = self.entries[index].replace_conversation(conversation);
        let id = self.entries[index].id();

        let mut index = index;
        if started_changed {
            let entry = self.entries.remove(index);
            let to = self.sorted_position(&entry);
            self.entries.insert(to, entry);
            if to != index {
                self.emit(RegistryEvent::Reordered { id, from: index, to });
            }
            index = to;
        }

        debug!(%id, index, added = diff.added, dropped = diff.dropped, "reloaded conversation");
        self.emit(RegistryEvent::Updated { id, index, diff });
        UpsertOutcome::Updated { id, index, diff }
    }

    /// Remove the entry for `path`. Unknown paths are a no-op.
    ///
    /// If the removed entry was current, the selection is cleared and left
    /// for the caller to reassign.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> Option<LogEntry> {
        let path = path.as_ref();
        let key = path_key(path);
        let Some(index) = self.entries.iter().position(|e| e.key() == key) else {
            debug!(path = %path.display(), "remove for unknown path ignored");
            return None;
        };

        let entry = self.entries.remove(index);
        let id = entry.id();
        debug!(%id, index, path = %path.display(), "removed conversation");
        self.emit(RegistryEvent::Removed {
            id,
            index,
            path: entry.path().to_path_buf(),
        });
        if self.current == Some(id) {
            self.clear_selection();
        }
        Some(entry)
    }

    /// Apply a rename as `remove(from)` followed by `upsert(to)`.
    pub fn rename(&mut self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<Option<UpsertOutcome>> {
        self.remove(from);
        self.upsert(to)
    }

    /// Index where `entry` belongs: started descending, then path key ascending.
    fn sorted_position(&self, entry: &LogEntry) -> usize {
        let started = entry.started();
        self.entries.partition_point(|e| {
            e.started() > started || (e.started() == started && e.key() < entry.key())
        })
    }
}
