//! Change feed: file-system notifications for the log folder.
//!
//! A [`ChangeFeed`] turns activity in the watched folder into
//! [`ChangeEvent`]s on a single channel. Subscribing hands the feed the
//! sending half; unsubscribing (or dropping the feed) stops delivery, so
//! the consumer's receive loop ends once the feed is torn down.
//!
//! Three implementations are provided:
//!
//! - [`NotifyFeed`]: native OS notifications through `notify`.
//! - [`PollFeed`]: periodic (mtime, size) snapshots, for file systems where
//!   native notifications are unreliable (network shares, some containers).
//! - [`ManualFeed`]: events pushed by hand, for embedding and tests.

mod notify_feed;
mod poll;

pub use notify_feed::{translate_event, NotifyFeed};
pub use poll::PollFeed;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::{WatchBackend, WatchConfig};
use crate::error::Result;

/// A change to one conversation file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// The file appeared or its content changed.
    CreatedOrChanged {
        /// Affected file.
        path: PathBuf,
    },
    /// The file is gone.
    Removed {
        /// Affected file.
        path: PathBuf,
    },
    /// The file was renamed within the folder.
    Renamed {
        /// Old path.
        from: PathBuf,
        /// New path.
        to: PathBuf,
    },
}

impl ChangeEvent {
    /// Shorthand for [`ChangeEvent::CreatedOrChanged`].
    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::CreatedOrChanged { path: path.into() }
    }

    /// Shorthand for [`ChangeEvent::Removed`].
    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::Removed { path: path.into() }
    }

    /// Shorthand for [`ChangeEvent::Renamed`].
    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::Renamed {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The path the event leaves behind (the new path for a rename).
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::CreatedOrChanged { path } | Self::Removed { path } => path,
            Self::Renamed { to, .. } => to,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreatedOrChanged { path } => write!(f, "changed {}", path.display()),
            Self::Removed { path } => write!(f, "removed {}", path.display()),
            Self::Renamed { from, to } => write!(f, "renamed {} -> {}", from.display(), to.display()),
        }
    }
}

/// A source of [`ChangeEvent`]s.
pub trait ChangeFeed: Send {
    /// Start delivering events to `sink`. Replaces any earlier subscription.
    fn subscribe(&mut self, sink: Sender<ChangeEvent>) -> Result<()>;

    /// Stop delivering events and release the sink.
    fn unsubscribe(&mut self);

    /// Whether events are currently being delivered.
    fn is_subscribed(&self) -> bool;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the feed selected by `config` for `folder`.
#[must_use]
pub fn feed_from_config(config: &WatchConfig, folder: &Path, extension: &str) -> Box<dyn ChangeFeed> {
    match config.backend {
        WatchBackend::Notify => Box::new(NotifyFeed::new(folder, extension)),
        WatchBackend::Poll => Box::new(PollFeed::new(folder, extension, config.poll_interval())),
    }
}

/// A feed whose events are pushed through a [`FeedHandle`].
#[derive(Debug, Default)]
pub struct ManualFeed {
    sink: Arc<Mutex<Option<Sender<ChangeEvent>>>>,
}

impl ManualFeed {
    /// A feed with no subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that can emit events from anywhere.
    #[must_use]
    pub fn handle(&self) -> FeedHandle {
        FeedHandle {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl ChangeFeed for ManualFeed {
    fn subscribe(&mut self, sink: Sender<ChangeEvent>) -> Result<()> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.sink.lock().take();
    }

    fn is_subscribed(&self) -> bool {
        self.sink.lock().is_some()
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Emits events into a [`ManualFeed`].
#[derive(Debug, Clone)]
pub struct FeedHandle {
    sink: Arc<Mutex<Option<Sender<ChangeEvent>>>>,
}

impl FeedHandle {
    /// Deliver `event`. Returns `false` if nobody is subscribed.
    pub fn emit(&self, event: ChangeEvent) -> bool {
        self.sink
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }
}
