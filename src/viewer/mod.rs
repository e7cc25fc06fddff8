//! Live view over a conversation log folder.
//!
//! [`LogViewer`] owns the shared [`ViewState`], the document store and a
//! change feed. One consumer thread drains the feed's channel: documents are
//! loaded outside the lock, and each mutation is applied under the write
//! lock, so readers only ever observe whole mutations.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatlog_watch::config::Config;
//! use chatlog_watch::navigator::SearchDirection;
//! use chatlog_watch::viewer::LogViewer;
//!
//! let config = Config::load()?;
//! let mut viewer = LogViewer::open(&config)?;
//! viewer.watch_with_config(&config.watch)?;
//!
//! viewer.set_filter("deadline");
//! viewer.advance(SearchDirection::Forward);
//! println!("{}", viewer.status());
//! # Ok::<(), chatlog_watch::ChatlogError>(())
//! ```

mod state;

pub use state::{DocumentView, MessageView, StatusSummary, ViewSnapshot, ViewState};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, WatchConfig};
use crate::error::{ChatlogError, Result};
use crate::navigator::{Cursor, SearchDirection};
use crate::registry::{EntryId, RegistryEvent};
use crate::store::DocumentStore;
use crate::util::{list_log_files, path_key};
use crate::watch::{feed_from_config, ChangeEvent, ChangeFeed};

/// Apply one change to the shared state. Loads happen before the lock is taken.
fn apply_event(state: &RwLock<ViewState>, store: &DocumentStore, event: ChangeEvent) {
    trace!(%event, "applying change");
    match event {
        ChangeEvent::CreatedOrChanged { path } => {
            let loaded = store.load(&path);
            if let Err(e) = state.write().apply_loaded(&path, loaded) {
                ViewState::report_failure(&path, &e);
            }
        }
        // A stale removal must not drop a file that exists again.
        ChangeEvent::Removed { path } if path.is_file() => {
            debug!(path = %path.display(), "removed path exists again; reloading");
            apply_event(state, store, ChangeEvent::CreatedOrChanged { path });
        }
        ChangeEvent::Removed { path } => {
            state.write().remove(&path);
        }
        ChangeEvent::Renamed { from, to } => {
            let loaded = store.load(&to);
            if let Err(e) = state.write().apply_rename(&from, &to, loaded) {
                ViewState::report_failure(&to, &e);
            }
        }
    }
}

fn run_consumer(rx: Receiver<ChangeEvent>, state: Arc<RwLock<ViewState>>, store: DocumentStore) {
    debug!("change consumer started");
    while let Ok(first) = rx.recv() {
        let mut batch = vec![first];
        batch.extend(rx.try_iter());
        let received = batch.len();
        batch.dedup();
        if batch.len() < received {
            trace!(received, applied = batch.len(), "coalesced duplicate changes");
        }
        for event in batch {
            apply_event(&state, &store, event);
        }
    }
    debug!("change consumer stopped");
}

/// A live, searchable view over one log folder.
pub struct LogViewer {
    folder: PathBuf,
    store: DocumentStore,
    state: Arc<RwLock<ViewState>>,
    feed: Option<Box<dyn ChangeFeed>>,
    sink: Option<Sender<ChangeEvent>>,
    consumer: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LogViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogViewer")
            .field("folder", &self.folder)
            .field("feed", &self.feed.as_ref().map(|feed| feed.name()))
            .finish_non_exhaustive()
    }
}

impl LogViewer {
    /// Open the folder named by `config` and load every log in it.
    pub fn open(config: &Config) -> Result<Self> {
        let folder = config.resolved_log_folder()?;
        Self::open_folder(folder, DocumentStore::new(&config.store))
    }

    /// Open `folder` with an explicit store and load every log in it.
    ///
    /// Files that fail to load are logged and skipped.
    pub fn open_folder(folder: impl Into<PathBuf>, store: DocumentStore) -> Result<Self> {
        let folder = folder.into();
        let paths = list_log_files(&folder, store.extension())?;

        let mut state = ViewState::new(store.clone());
        let report = state.reconcile(&paths);
        info!(
            folder = %folder.display(),
            conversations = state.registry().len(),
            failed = report.failed.len(),
            "opened conversation folder"
        );

        Ok(Self {
            folder,
            store,
            state: Arc::new(RwLock::new(state)),
            feed: None,
            sink: None,
            consumer: None,
        })
    }

    /// The watched folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Start applying changes from `feed`, replacing any previous feed.
    ///
    /// After subscribing, the folder is rescanned so files that appeared or
    /// vanished since the initial load are not missed. The rescan goes
    /// through the same channel as the feed.
    pub fn watch(&mut self, mut feed: Box<dyn ChangeFeed>) -> Result<()> {
        self.shutdown();

        let (tx, rx) = mpsc::channel();
        feed.subscribe(tx.clone())?;

        let state = Arc::clone(&self.state);
        let store = self.store.clone();
        let consumer = thread::Builder::new()
            .name("chatlog-consumer".to_string())
            .spawn(move || run_consumer(rx, state, store))
            .map_err(|e| ChatlogError::io("Failed to spawn change consumer", e))?;

        info!(feed = feed.name(), folder = %self.folder.display(), "watching for changes");
        self.feed = Some(feed);
        self.sink = Some(tx);
        self.consumer = Some(consumer);

        self.rescan()?;
        Ok(())
    }

    /// Start the feed selected by `config`.
    pub fn watch_with_config(&mut self, config: &WatchConfig) -> Result<()> {
        let feed = feed_from_config(config, &self.folder, self.store.extension());
        self.watch(feed)
    }

    /// Whether a feed is attached.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.feed.as_ref().is_some_and(|f| f.is_subscribed())
    }

    /// Bring the registry in line with the folder listing: load unknown
    /// files and drop entries whose file is gone.
    ///
    /// While watching, the changes are queued behind the feed's events so the
    /// consumer applies everything in order; otherwise they are applied here.
    /// Returns the number of changes found.
    pub fn rescan(&self) -> Result<usize> {
        let changes = self.pending_changes()?;
        let count = changes.len();
        match &self.sink {
            Some(sink) => {
                for change in changes {
                    if sink.send(change).is_err() {
                        warn!("change consumer gone; dropping rescan results");
                        break;
                    }
                }
            }
            None => {
                for change in changes {
                    self.apply(change);
                }
            }
        }
        if count > 0 {
            debug!(changes = count, "rescanned folder");
        }
        Ok(count)
    }

    /// Differences between the registry and the folder. The listing is taken
    /// under the read lock so it cannot interleave with an applied change.
    fn pending_changes(&self) -> Result<Vec<ChangeEvent>> {
        let state = self.state.read();
        let paths = list_log_files(&self.folder, self.store.extension())?;
        let listed: HashSet<String> = paths.iter().map(|p| path_key(p)).collect();
        let registry = state.registry();

        let vanished = registry
            .entries()
            .iter()
            .filter(|e| !listed.contains(e.key()))
            .map(|e| ChangeEvent::removed(e.path()));
        let unknown = paths
            .iter()
            .filter(|p| registry.find_by_path(p).is_none())
            .map(|p| ChangeEvent::changed(p.clone()));
        Ok(vanished.chain(unknown).collect())
    }

    /// Apply a change synchronously on the calling thread.
    pub fn apply(&self, event: ChangeEvent) {
        apply_event(&self.state, &self.store, event);
    }

    /// Read access to the whole state.
    pub fn state(&self) -> RwLockReadGuard<'_, ViewState> {
        self.state.read()
    }

    /// Owned copy of the current view.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        self.state.read().snapshot()
    }

    /// Status line counts.
    #[must_use]
    pub fn status(&self) -> StatusSummary {
        self.state.read().status()
    }

    /// Subscribe to structural registry changes.
    pub fn subscribe(&self) -> Receiver<RegistryEvent> {
        self.state.write().registry_mut().subscribe()
    }

    /// Set the filter text and move to its first match.
    pub fn set_filter(&self, text: &str) -> Option<Cursor> {
        self.state.write().set_filter(text)
    }

    /// Clear the filter.
    pub fn clear_filter(&self) {
        self.state.write().clear_filter();
    }

    /// Move to the next match in `direction`.
    pub fn advance(&self, direction: SearchDirection) -> Option<Cursor> {
        self.state.write().advance(direction)
    }

    /// Make a document current.
    pub fn select(&self, id: EntryId) -> bool {
        self.state.write().select(id)
    }

    /// Stop watching: unsubscribe the feed, then wait for the consumer to
    /// drain and exit. The loaded state stays readable.
    pub fn shutdown(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.unsubscribe();
            debug!(feed = feed.name(), "unsubscribed change feed");
        }
        self.sink = None;
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                warn!("change consumer panicked");
            }
        }
    }
}

impl Drop for LogViewer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Conversation, Direction, Message};
    use crate::watch::ManualFeed;
    use chrono::{TimeZone, Utc};
    use std::time::{Duration, Instant};

    fn write_log(store: &DocumentStore, folder: &Path, id: &str, hour: u32, texts: &[&str]) -> PathBuf {
        let started = Utc.with_ymd_and_hms(2024, 2, 1, hour, 0, 0).unwrap();
        let messages = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Message::new(started + chrono::Duration::seconds(i as i64), Direction::Incoming, t))
            .collect();
        let path = store.path_for(folder, id);
        store.save(&Conversation::from_parts(id, started, messages), &path).unwrap();
        path
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_open_loads_folder_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        write_log(&store, dir.path(), "early", 8, &["a"]);
        write_log(&store, dir.path(), "late", 12, &["b", "c"]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let viewer = LogViewer::open_folder(dir.path(), store).unwrap();
        let snapshot = viewer.snapshot();
        let ids: Vec<_> = snapshot.documents.iter().map(|d| d.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["late", "early"]);
        assert_eq!(viewer.status().to_string(), "2 conversations, 3 messages");
    }

    #[test]
    fn test_open_missing_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = LogViewer::open_folder(dir.path().join("nope"), DocumentStore::default()).unwrap_err();
        assert!(matches!(err, ChatlogError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_consumer_applies_feed_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        write_log(&store, dir.path(), "first", 8, &["hello"]);

        let mut viewer = LogViewer::open_folder(dir.path(), store.clone()).unwrap();
        let feed = ManualFeed::new();
        let handle = feed.handle();
        viewer.watch(Box::new(feed)).unwrap();
        assert!(viewer.is_watching());

        let second = write_log(&store, dir.path(), "second", 9, &["hello", "again"]);
        assert!(handle.emit(ChangeEvent::changed(&second)));
        assert!(handle.emit(ChangeEvent::changed(&second)));
        // The rescan inside watch() may already have picked the file up.
        assert!(wait_until(|| viewer.status().conversations == 2));

        std::fs::remove_file(&second).unwrap();
        handle.emit(ChangeEvent::removed(&second));
        assert!(wait_until(|| viewer.status().conversations == 1));

        viewer.shutdown();
        assert!(!viewer.is_watching());
        assert!(!handle.emit(ChangeEvent::changed(&second)));
    }

    #[test]
    fn test_rescan_picks_up_files_missed_before_watch() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        let gone = write_log(&store, dir.path(), "gone", 8, &["x"]);
        let viewer = LogViewer::open_folder(dir.path(), store.clone()).unwrap();

        std::fs::remove_file(&gone).unwrap();
        write_log(&store, dir.path(), "new", 9, &["y"]);

        assert_eq!(viewer.rescan().unwrap(), 2);
        let snapshot = viewer.snapshot();
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.documents[0].conversation_id, "new");
    }

    #[test]
    fn test_filter_and_advance_through_viewer() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        write_log(&store, dir.path(), "d1", 10, &["hello", "goodbye"]);
        write_log(&store, dir.path(), "d2", 9, &["hello world"]);
        let viewer = LogViewer::open_folder(dir.path(), store).unwrap();

        let first = viewer.set_filter("HELLO").unwrap();
        let second = viewer.advance(SearchDirection::Forward).unwrap();
        let third = viewer.advance(SearchDirection::Forward).unwrap();
        assert_ne!(first.entry, second.entry);
        assert_eq!(first, third);
        assert_eq!(viewer.status().filter_matches, Some(2));

        viewer.clear_filter();
        assert!(viewer.snapshot().cursor.is_none());
    }

    #[test]
    fn test_removal_of_existing_file_reloads_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        let path = write_log(&store, dir.path(), "alive", 8, &["one"]);
        let viewer = LogViewer::open_folder(dir.path(), store.clone()).unwrap();

        write_log(&store, dir.path(), "alive", 8, &["one", "two"]);
        viewer.apply(ChangeEvent::removed(&path));

        assert_eq!(viewer.status().to_string(), "1 conversations, 2 messages");
    }

    #[test]
    fn test_rescan_while_watching_is_applied_by_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        write_log(&store, dir.path(), "first", 8, &["a"]);
        let mut viewer = LogViewer::open_folder(dir.path(), store.clone()).unwrap();
        let feed = ManualFeed::new();
        let handle = feed.handle();
        viewer.watch(Box::new(feed)).unwrap();

        let late = write_log(&store, dir.path(), "late", 9, &["b"]);
        assert_eq!(viewer.rescan().unwrap(), 1);
        write_log(&store, dir.path(), "late", 9, &["b", "c"]);
        handle.emit(ChangeEvent::changed(&late));

        viewer.shutdown();
        let snapshot = viewer.snapshot();
        assert_eq!(snapshot.documents.len(), 2);
        assert_eq!(snapshot.documents[0].conversation_id, "late");
        assert_eq!(snapshot.documents[0].messages.len(), 2);
    }

    #[test]
    fn test_apply_is_synchronous() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        let viewer = LogViewer::open_folder(dir.path(), store.clone()).unwrap();
        let events = viewer.subscribe();

        let path = write_log(&store, dir.path(), "solo", 8, &["hi"]);
        viewer.apply(ChangeEvent::changed(&path));

        assert_eq!(viewer.status().conversations, 1);
        assert!(matches!(events.try_recv().unwrap(), RegistryEvent::Inserted { index: 0, .. }));
    }
}
