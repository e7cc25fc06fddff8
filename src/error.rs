//! Error types for chatlog-watch.
//!
//! Every fallible operation in the crate returns [`Result`], built on the
//! [`ChatlogError`] enum. Per-file failures are designed to be logged and
//! skipped by batch callers; none of them is fatal to the process.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which half of the document store gave up retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    /// Reading a conversation file.
    Read,
    /// Writing a conversation file.
    Write,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Primary error type for chatlog-watch operations.
#[derive(Error, Debug)]
pub enum ChatlogError {
    /// A conversation file was read but its content is malformed.
    #[error("Failed to parse conversation {path}: {message}")]
    Parse {
        /// Path of the malformed file.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
    },

    /// Bounded retry was exhausted while reading or writing a file.
    #[error("Timed out after {waited_ms}ms trying to {operation} {path}")]
    IoTimeout {
        /// Path being read or written.
        path: PathBuf,
        /// The operation that timed out.
        operation: IoOperation,
        /// How long the store kept retrying.
        waited_ms: u64,
        /// The last failure seen before giving up.
        #[source]
        source: Option<std::io::Error>,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Directory not found.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// Path to the missing directory.
        path: PathBuf,
    },

    /// No conversation in the registry matched the request.
    #[error("Conversation not found: {query}")]
    ConversationNotFound {
        /// The id or path that was looked up.
        query: String,
    },

    /// Encoding a conversation for disk failed.
    #[error("Failed to encode conversation {id}: {message}")]
    Encode {
        /// Conversation identifier.
        id: String,
        /// Human-readable error message.
        message: String,
    },

    /// The file-system watcher could not be set up.
    #[error("Watch error: {message}")]
    Watch {
        /// Human-readable error message.
        message: String,
        /// Underlying notify error.
        #[source]
        source: Option<notify::Error>,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Human-readable error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {context}")]
    IoError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {context}")]
    SerializationError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid argument.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Name of the invalid argument.
        name: String,
        /// Reason why the argument is invalid.
        reason: String,
    },

    /// Unsupported operation or feature.
    #[error("Unsupported: {feature}")]
    Unsupported {
        /// Name of the unsupported feature.
        feature: String,
    },
}

impl ChatlogError {
    /// Create a new parse error.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            context: context.into(),
            source,
        }
    }

    /// Create a new watch error.
    #[must_use]
    pub fn watch(message: impl Into<String>, source: notify::Error) -> Self {
        Self::Watch {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a new unsupported error.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Parse { .. } => exit_codes::EXIT_PARSE_ERROR,
            Self::FileNotFound { .. }
            | Self::DirectoryNotFound { .. }
            | Self::ConversationNotFound { .. } => exit_codes::EXIT_FILE_NOT_FOUND,
            Self::ConfigError { .. } | Self::InvalidConfig { .. } => exit_codes::EXIT_CONFIG_ERROR,
            Self::IoTimeout { .. } => exit_codes::EXIT_TIMEOUT,
            Self::InvalidArgument { .. } => exit_codes::EXIT_USAGE_ERROR,
            Self::IoError { .. } => exit_codes::EXIT_IO_ERROR,
            _ => exit_codes::EXIT_GENERAL_ERROR,
        }
    }

    /// Check whether the failure is scoped to one file, so a batch caller
    /// can log it and carry on with the rest.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::IoTimeout { .. } | Self::FileNotFound { .. }
        )
    }

    /// Check whether this is the "path no longer exists" case.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }
}

/// Result type alias for chatlog-watch operations.
pub type Result<T> = std::result::Result<T, ChatlogError>;

impl From<std::io::Error> for ChatlogError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            context: "I/O operation failed".to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for ChatlogError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            context: "JSON operation failed".to_string(),
            source: err,
        }
    }
}

impl From<notify::Error> for ChatlogError {
    fn from(err: notify::Error) -> Self {
        Self::watch("file system watcher failed", err)
    }
}

/// Exit codes for CLI operations.
pub mod exit_codes {
    /// Operation completed successfully.
    pub const EXIT_SUCCESS: i32 = 0;
    /// General/unspecified error.
    pub const EXIT_GENERAL_ERROR: i32 = 1;
    /// A conversation file could not be parsed.
    pub const EXIT_PARSE_ERROR: i32 = 2;
    /// Specified file or conversation not found.
    pub const EXIT_FILE_NOT_FOUND: i32 = 3;
    /// Invalid configuration.
    pub const EXIT_CONFIG_ERROR: i32 = 5;
    /// A bounded read or write retry gave up.
    pub const EXIT_TIMEOUT: i32 = 8;
    /// Invalid command-line usage (BSD standard).
    pub const EXIT_USAGE_ERROR: i32 = 64;
    /// I/O error (BSD standard).
    pub const EXIT_IO_ERROR: i32 = 74;
}
