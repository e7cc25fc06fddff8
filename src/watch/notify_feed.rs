//! Native file-system notifications.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

use super::{ChangeEvent, ChangeFeed};
use crate::error::{ChatlogError, Result};
use crate::util::has_extension;

/// Translate one raw notification into zero or more change events.
///
/// Only paths carrying `extension` are reported. A rename where just one
/// side carries the extension becomes a remove or a create. Metadata-only
/// and access notifications are dropped.
#[must_use]
pub fn translate_event(event: &Event, extension: &str) -> Vec<ChangeEvent> {
    let relevant = |p: &PathBuf| has_extension(p, extension);
    let each = |make: fn(PathBuf) -> ChangeEvent| -> Vec<ChangeEvent> {
        event.paths.iter().filter(|p| relevant(p)).cloned().map(make).collect()
    };

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => each(ChangeEvent::changed),
        EventKind::Remove(_) => each(ChangeEvent::removed),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [from, to, ..]) => match (relevant(from), relevant(to)) {
                (true, true) => vec![ChangeEvent::renamed(from.clone(), to.clone())],
                (true, false) => vec![ChangeEvent::removed(from.clone())],
                (false, true) => vec![ChangeEvent::changed(to.clone())],
                (false, false) => Vec::new(),
            },
            (RenameMode::From, _) => each(ChangeEvent::removed),
            (RenameMode::To, _) => each(ChangeEvent::changed),
            _ => event
                .paths
                .iter()
                .filter(|p| relevant(p))
                .map(|p| {
                    if p.exists() {
                        ChangeEvent::changed(p.clone())
                    } else {
                        ChangeEvent::removed(p.clone())
                    }
                })
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(ChangeEvent::changed),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// How long the first half of a rename waits for its partner.
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(50);

/// Joins the halves of a rename that share a tracker cookie.
///
/// Backends such as inotify report one rename as `Name(From)`, `Name(To)`
/// and then `Name(Both)`. Reported one by one, the first half would drop
/// the document before the rename could carry its selection over. A `From`
/// with a tracker is held back until its `To` arrives, and the pair becomes
/// a single rename; the trailing `Both` is then swallowed. A `From` whose
/// partner never shows up is released as a removal by [`flush`](Self::flush).
#[derive(Debug)]
pub(crate) struct RenamePairer {
    extension: String,
    pending: Option<(usize, PathBuf)>,
    paired: Vec<usize>,
}

impl RenamePairer {
    pub(crate) fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            pending: None,
            paired: Vec::new(),
        }
    }

    /// Whether a `From` half is waiting for its partner.
    pub(crate) fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one raw event, returning the changes it completes.
    pub(crate) fn push(&mut self, event: &Event) -> Vec<ChangeEvent> {
        let tracker = event.attrs.tracker();
        match (&event.kind, tracker) {
            (EventKind::Modify(ModifyKind::Name(RenameMode::From)), Some(cookie)) => {
                let out = self.flush();
                if let Some(from) = event.paths.first() {
                    self.pending = Some((cookie, from.clone()));
                }
                out
            }
            (EventKind::Modify(ModifyKind::Name(RenameMode::To)), Some(cookie))
                if self.pending.as_ref().is_some_and(|(c, _)| *c == cookie) =>
            {
                let Some(to) = event.paths.first() else {
                    return self.flush();
                };
                let Some((_, from)) = self.pending.take() else {
                    return Vec::new();
                };
                self.paired.push(cookie);
                if self.paired.len() > 16 {
                    self.paired.remove(0);
                }
                let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
                    .add_path(from)
                    .add_path(to.clone());
                translate_event(&both, &self.extension)
            }
            (EventKind::Modify(ModifyKind::Name(RenameMode::Both)), Some(cookie))
                if self.paired.contains(&cookie) =>
            {
                self.paired.retain(|c| *c != cookie);
                Vec::new()
            }
            _ => {
                let mut out = self.flush();
                out.extend(translate_event(event, &self.extension));
                out
            }
        }
    }

    /// Release a held `From` half as a removal.
    pub(crate) fn flush(&mut self) -> Vec<ChangeEvent> {
        let Some((_, from)) = self.pending.take() else {
            return Vec::new();
        };
        let removed = Event::new(EventKind::Remove(RemoveKind::Any)).add_path(from);
        translate_event(&removed, &self.extension)
    }
}

/// Forward raw events to `sink`, pairing rename halves on the way.
fn forward_events(raw: Receiver<Event>, sink: Sender<ChangeEvent>, mut pairer: RenamePairer) {
    loop {
        let next = if pairer.is_waiting() {
            match raw.recv_timeout(RENAME_PAIR_WINDOW) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match raw.recv() {
                Ok(event) => Some(event),
                Err(_) => break,
            }
        };

        let changes = match next {
            Some(event) => pairer.push(&event),
            None => pairer.flush(),
        };
        for change in changes {
            if sink.send(change).is_err() {
                return;
            }
        }
    }
    for change in pairer.flush() {
        let _ = sink.send(change);
    }
}

/// Feed backed by [`notify::RecommendedWatcher`], watching one folder
/// non-recursively.
pub struct NotifyFeed {
    folder: PathBuf,
    extension: String,
    watcher: Option<(RecommendedWatcher, JoinHandle<()>)>,
}

impl NotifyFeed {
    /// A feed for `folder`, reporting files with `extension`.
    pub fn new(folder: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            extension: extension.into(),
            watcher: None,
        }
    }

    /// The watched folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

impl fmt::Debug for NotifyFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyFeed")
            .field("folder", &self.folder)
            .field("extension", &self.extension)
            .field("subscribed", &self.watcher.is_some())
            .finish()
    }
}

impl ChangeFeed for NotifyFeed {
    fn subscribe(&mut self, sink: Sender<ChangeEvent>) -> Result<()> {
        self.unsubscribe();

        if !self.folder.is_dir() {
            return Err(ChatlogError::DirectoryNotFound {
                path: self.folder.clone(),
            });
        }

        let (raw_tx, raw_rx) = mpsc::channel::<Event>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    trace!(kind = ?event.kind, paths = ?event.paths, "received notify event");
                    // A closed channel means the feed is shutting down.
                    let _ = raw_tx.send(event);
                }
                Err(e) => warn!(error = %e, "file watcher reported an error"),
            },
            Config::default(),
        )
        .map_err(|e| ChatlogError::watch("failed to create file watcher", e))?;

        watcher
            .watch(&self.folder, RecursiveMode::NonRecursive)
            .map_err(|e| ChatlogError::watch(format!("failed to watch {}", self.folder.display()), e))?;

        let pairer = RenamePairer::new(self.extension.clone());
        let forwarder = thread::Builder::new()
            .name("chatlog-notify".to_string())
            .spawn(move || forward_events(raw_rx, sink, pairer))
            .map_err(|e| ChatlogError::io("Failed to spawn notify forwarder", e))?;

        debug!(folder = %self.folder.display(), "watching folder for changes");
        self.watcher = Some((watcher, forwarder));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some((mut watcher, forwarder)) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.folder) {
                debug!(error = %e, "unwatch failed; dropping watcher anyway");
            }
            // Dropping the watcher closes the raw channel and ends the forwarder.
            drop(watcher);
            if forwarder.join().is_err() {
                warn!("notify forwarder panicked");
            }
            debug!(folder = %self.folder.display(), "stopped watching folder");
        }
    }

    fn is_subscribed(&self) -> bool {
        self.watcher.is_some()
    }

    fn name(&self) -> &'static str {
        "notify"
    }
}

impl Drop for NotifyFeed {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
