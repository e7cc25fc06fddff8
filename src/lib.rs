//! chatlog-watch: a live, searchable view over a folder of conversation logs.
//!
//! An external capture process appends instant-message conversations to one
//! XML file per conversation. This crate keeps an ordered, in-memory registry
//! of those files in sync with the folder, filters messages by free text, and
//! navigates the matches across conversations.
//!
//! # Features
//!
//! - **Live**: file-system notifications (or polling) keep the view current
//! - **Tolerant**: reads and writes retry around a concurrent writer, with
//!   hard ceilings instead of unbounded blocking
//! - **Ordered**: conversations sorted newest first, with stable handles
//! - **Searchable**: case-insensitive filter over bodies and contact names,
//!   with forward and backward match navigation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chatlog_watch::prelude::*;
//!
//! fn main() -> chatlog_watch::Result<()> {
//!     let config = Config::load()?;
//!     let mut viewer = LogViewer::open(&config)?;
//!     viewer.watch_with_config(&config.watch)?;
//!
//!     if let Some(cursor) = viewer.set_filter("release") {
//!         println!("first match: {} message {}", cursor.entry, cursor.message);
//!     }
//!     println!("{}", viewer.status());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`model`]: conversations and messages
//! - [`store`]: loading and saving single documents with bounded retry
//! - [`registry`]: the ordered collection of documents and its change events
//! - [`filter`]: the text predicate and per-message match flags
//! - [`navigator`]: match traversal across documents
//! - [`watch`]: change feeds for the log folder
//! - [`viewer`]: ties the above together behind a lock with a consumer thread
//! - [`recorder`]: appends captured messages to a conversation log
//! - [`cli`]: command-line interface
//! - [`config`]: configuration management
//! - [`error`]: error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod navigator;
pub mod recorder;
pub mod registry;
pub mod store;
pub mod util;
pub mod viewer;
pub mod watch;

// Re-export commonly used types at the crate root
pub use error::{ChatlogError, Result};
pub use model::{Conversation, Direction, Message};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ChatlogError, Result};
    pub use crate::model::{Conversation, Direction, Message};
    pub use crate::navigator::{Cursor, SearchDirection};
    pub use crate::recorder::{ConversationRecorder, NewMessage};
    pub use crate::registry::{EntryId, LogRegistry};
    pub use crate::store::DocumentStore;
    pub use crate::viewer::{LogViewer, ViewSnapshot};
    pub use crate::watch::{ChangeEvent, ChangeFeed};
}
