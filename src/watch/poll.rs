//! Polling change feed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::{ChangeEvent, ChangeFeed};
use crate::error::{ChatlogError, Result};
use crate::util::list_log_files;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

type Snapshot = BTreeMap<PathBuf, FileStamp>;

fn snapshot(folder: &Path, extension: &str) -> Result<Snapshot> {
    let mut files = Snapshot::new();
    for path in list_log_files(folder, extension)? {
        // Files can vanish between listing and stat.
        if let Ok(meta) = std::fs::metadata(&path) {
            files.insert(
                path,
                FileStamp {
                    modified: meta.modified().ok(),
                    len: meta.len(),
                },
            );
        }
    }
    Ok(files)
}

fn diff(old: &Snapshot, new: &Snapshot) -> Vec<ChangeEvent> {
    let mut events: Vec<ChangeEvent> = old
        .keys()
        .filter(|p| !new.contains_key(*p))
        .cloned()
        .map(ChangeEvent::removed)
        .collect();
    events.extend(
        new.iter()
            .filter(|(p, stamp)| old.get(*p) != Some(stamp))
            .map(|(p, _)| ChangeEvent::changed(p.clone())),
    );
    events
}

/// Feed that scans the folder every `interval` and reports differences.
///
/// Renames show up as a removal plus a creation.
#[derive(Debug)]
pub struct PollFeed {
    folder: PathBuf,
    extension: String,
    interval: Duration,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl PollFeed {
    /// A feed scanning `folder` for files with `extension`.
    pub fn new(folder: impl Into<PathBuf>, extension: impl Into<String>, interval: Duration) -> Self {
        Self {
            folder: folder.into(),
            extension: extension.into(),
            interval,
            worker: None,
        }
    }
}

impl ChangeFeed for PollFeed {
    fn subscribe(&mut self, sink: Sender<ChangeEvent>) -> Result<()> {
        self.unsubscribe();

        let mut last = snapshot(&self.folder, &self.extension)?;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let folder = self.folder.clone();
        let extension = self.extension.clone();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("chatlog-poll".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let current = match snapshot(&folder, &extension) {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(folder = %folder.display(), error = %e, "poll scan failed");
                        continue;
                    }
                };
                for event in diff(&last, &current) {
                    if sink.send(event).is_err() {
                        debug!("change consumer gone; stopping poll thread");
                        return;
                    }
                }
                last = current;
            })
            .map_err(|e| ChatlogError::io("Failed to spawn poll thread", e))?;

        debug!(folder = %self.folder.display(), interval_ms = interval.as_millis() as u64, "polling folder for changes");
        self.worker = Some((stop_tx, handle));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some((stop, handle)) = self.worker.take() {
            let _ = stop.send(());
            if handle.join().is_err() {
                warn!("poll thread panicked");
            }
        }
    }

    fn is_subscribed(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &'static str {
        "poll"
    }
}

impl Drop for PollFeed {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
