//! Document store: loads and saves single conversation files.
//!
//! Log files are appended to by an external capture process with no shared
//! lock, so both directions use optimistic retry with a hard ceiling:
//!
//! - **Load** retries while the read fails or yields empty content, every
//!   `retry_interval` until `read_timeout` (2s by default) has passed.
//! - **Save** writes atomically and retries transient failures (for example
//!   a file held open by another writer) until `write_timeout` (1s).
//!
//! Past the ceiling both fail with [`ChatlogError::IoTimeout`] instead of
//! blocking further.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatlog_watch::config::StoreConfig;
//! use chatlog_watch::store::DocumentStore;
//!
//! let store = DocumentStore::new(&StoreConfig::default());
//! let conversation = store.load("/home/me/Documents/LyncLog/room42.xml")?;
//! println!("{} messages", conversation.len());
//! # Ok::<(), chatlog_watch::ChatlogError>(())
//! ```

mod format;

pub use format::{ConversationFormat, XmlFormat};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace, warn};

use crate::config::StoreConfig;
use crate::error::{ChatlogError, IoOperation, Result};
use crate::model::Conversation;
use crate::util::{atomic_write_raw, generate_conversation_id};

/// Why [`retry_io`] stopped.
#[derive(Debug)]
pub struct RetryFailure {
    /// Time spent before giving up.
    pub waited: Duration,
    /// The last error returned by the operation.
    pub error: io::Error,
    /// `true` when the ceiling was hit, `false` when the error was not retryable.
    pub timed_out: bool,
}

/// Run `op` until it succeeds, retrying every `interval` until `timeout` has elapsed.
///
/// `NotFound` is returned immediately without retrying. Any other error is
/// retried; once the elapsed time reaches `timeout` the last error is
/// returned with `timed_out` set.
pub fn retry_io<T, F>(timeout: Duration, interval: Duration, mut op: F) -> std::result::Result<T, RetryFailure>
where
    F: FnMut() -> io::Result<T>,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(RetryFailure {
                    waited: start.elapsed(),
                    error,
                    timed_out: false,
                });
            }
            Err(error) => {
                let waited = start.elapsed();
                if waited >= timeout {
                    return Err(RetryFailure {
                        waited,
                        error,
                        timed_out: true,
                    });
                }
                trace!(attempt, error = %error, "retrying file operation");
                thread::sleep(interval.min(timeout - waited).max(Duration::from_millis(1)));
            }
        }
    }
}

/// Loads and saves conversation documents with bounded retry.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    format: Arc<dyn ConversationFormat>,
    read_timeout: Duration,
    write_timeout: Duration,
    retry_interval: Duration,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl DocumentStore {
    /// Create a store using the XML format and the configured bounds.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            format: Arc::new(XmlFormat::new(config.extension.clone())),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            retry_interval: config.retry_interval(),
        }
    }

    /// Use a different document format.
    #[must_use]
    pub fn with_format(mut self, format: Arc<dyn ConversationFormat>) -> Self {
        self.format = format;
        self
    }

    /// Set the read retry ceiling.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write retry ceiling.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// File extension of the configured format.
    #[must_use]
    pub fn extension(&self) -> &str {
        self.format.extension()
    }

    /// Path of the log file for an external conversation identifier.
    #[must_use]
    pub fn path_for(&self, folder: &Path, external_id: &str) -> PathBuf {
        folder.join(format!("{}.{}", generate_conversation_id(external_id), self.extension()))
    }

    /// Load a conversation from `path`.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Conversation> {
        let path = path.as_ref();

        let bytes = retry_io(self.read_timeout, self.retry_interval, || {
            let bytes = std::fs::read(path)?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "file is empty"));
            }
            Ok(bytes)
        })
        .map_err(|failure| self.failure_to_error(path, IoOperation::Read, failure))?;

        let content = String::from_utf8(bytes)
            .map_err(|e| ChatlogError::parse(path, format!("content is not valid UTF-8: {e}")))?;
        let conversation = self.format.decode(path, &content)?;

        debug!(id = %conversation.id, messages = conversation.len(), "loaded conversation");
        Ok(conversation)
    }

    /// Save `conversation` to `path`, replacing the file atomically.
    #[instrument(skip(self, conversation, path), fields(id = %conversation.id, path = %path.as_ref().display()))]
    pub fn save(&self, conversation: &Conversation, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.format.encode(conversation)?;

        retry_io(self.write_timeout, self.retry_interval, || {
            atomic_write_raw(path, content.as_bytes())
        })
        .map_err(|failure| self.failure_to_error(path, IoOperation::Write, failure))?;

        debug!(messages = conversation.len(), "saved conversation");
        Ok(())
    }

    fn failure_to_error(&self, path: &Path, operation: IoOperation, failure: RetryFailure) -> ChatlogError {
        if failure.timed_out {
            warn!(
                path = %path.display(),
                %operation,
                waited_ms = failure.waited.as_millis() as u64,
                error = %failure.error,
                "giving up on file after retrying"
            );
            ChatlogError::IoTimeout {
                path: path.to_path_buf(),
                operation,
                waited_ms: failure.waited.as_millis() as u64,
                source: Some(failure.error),
            }
        } else if failure.error.kind() == io::ErrorKind::NotFound && operation == IoOperation::Read {
            ChatlogError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ChatlogError::io(format!("Failed to {operation} {}", path.display()), failure.error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, Message};
    use chrono::{TimeZone, Utc};

    fn fast_store() -> DocumentStore {
        DocumentStore::default()
            .with_read_timeout(Duration::from_millis(200))
            .with_write_timeout(Duration::from_millis(200))
            .with_retry_interval(Duration::from_millis(20))
    }

    fn sample() -> Conversation {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut conv = Conversation::with_started("room42", started);
        conv.push(Message::new(started, Direction::Incoming, "hello").with_contact(Some("Ada".into()), None));
        conv
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room42.xml");
        let store = fast_store();

        store.save(&sample(), &path).unwrap();
        assert_eq!(store.load(&path).unwrap(), sample());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = fast_store().load(dir.path().join("nope.xml")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_empty_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xml");
        std::fs::write(&path, "").unwrap();

        let err = fast_store().load(&path).unwrap_err();
        assert!(matches!(
            err,
            ChatlogError::IoTimeout {
                operation: IoOperation::Read,
                ..
            }
        ));
    }

    #[test]
    fn test_load_waits_for_writer_to_fill_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.xml");
        std::fs::write(&path, "").unwrap();

        let store = fast_store().with_read_timeout(Duration::from_secs(2));
        let content = store.format.encode(&sample()).unwrap();
        let writer_path = path.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            std::fs::write(writer_path, content).unwrap();
        });

        let conv = store.load(&path).unwrap();
        writer.join().unwrap();
        assert_eq!(conv.id, "room42");
    }

    #[test]
    fn test_load_malformed_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xml");
        std::fs::write(&path, "<Conversation><Started>nope</Started></Conversation>").unwrap();

        let err = fast_store().load(&path).unwrap_err();
        assert!(matches!(err, ChatlogError::Parse { .. }));
    }

    #[test]
    fn test_retry_io_gives_up_at_ceiling() {
        let start = Instant::now();
        let result: std::result::Result<(), _> =
            retry_io(Duration::from_millis(100), Duration::from_millis(10), || {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            });
        let failure = result.unwrap_err();
        assert!(failure.timed_out);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_retry_io_not_found_is_immediate() {
        let mut calls = 0;
        let failure = retry_io::<(), _>(Duration::from_secs(5), Duration::from_millis(10), || {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        })
        .unwrap_err();
        assert!(!failure.timed_out);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_path_for_uses_safe_id() {
        let store = DocumentStore::default();
        assert_eq!(
            store.path_for(Path::new("/logs"), "Room/Name:1"),
            PathBuf::from("/logs/Room2fName3a1.xml")
        );
    }
}
