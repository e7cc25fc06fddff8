//! Configuration management for chatlog-watch.
//!
//! Handles:
//! - The conversation log folder and file extension
//! - Document store retry bounds
//! - Change feed backend selection
//! - Display preferences
//!
//! The log folder is always an explicit value handed to the store and the
//! viewer at construction; nothing reads it from process-wide state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatlogError, Result};
use crate::util::atomic_write;

/// Name of the default log folder under the user's documents directory.
pub const DEFAULT_LOG_FOLDER_NAME: &str = "LyncLog";

/// Default conversation file extension.
pub const DEFAULT_EXTENSION: &str = "xml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Conversation log folder (default: `<documents>/LyncLog`).
    #[serde(default)]
    pub log_folder: Option<PathBuf>,
    /// Document store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Change feed settings.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Display options.
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        let config_path = default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatlogError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ChatlogError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path using an atomic write.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ChatlogError::InvalidConfig {
            message: format!("Failed to serialize config: {e}"),
        })?;

        atomic_write(path, content.as_bytes())
    }

    /// Reject values the store and feed cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.store.extension.trim().is_empty() || self.store.extension.contains('.') {
            return Err(ChatlogError::InvalidConfig {
                message: format!(
                    "store.extension must be a bare extension, got '{}'",
                    self.store.extension
                ),
            });
        }
        if self.store.retry_interval_ms == 0 {
            return Err(ChatlogError::InvalidConfig {
                message: "store.retry_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(ChatlogError::InvalidConfig {
                message: "watch.poll_interval_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The configured log folder, or the platform default.
    pub fn resolved_log_folder(&self) -> Result<PathBuf> {
        match &self.log_folder {
            Some(folder) => Ok(folder.clone()),
            None => default_log_folder(),
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Conversation file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Longest time to keep retrying a read, in milliseconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Longest time to keep retrying a write, in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
    /// Pause between attempts, in milliseconds.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            read_timeout_ms: default_read_timeout(),
            write_timeout_ms: default_write_timeout(),
            retry_interval_ms: default_retry_interval(),
        }
    }
}

impl StoreConfig {
    /// Read retry ceiling.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write retry ceiling.
    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Which change feed implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// Native OS notifications through `notify`.
    #[default]
    Notify,
    /// Periodic directory scans.
    Poll,
}

/// Change feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Feed implementation.
    #[serde(default)]
    pub backend: WatchBackend,
    /// Scan interval for the polling backend, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            backend: WatchBackend::default(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl WatchConfig {
    /// Scan interval for the polling backend.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Truncate message bodies in list views at this many characters.
    #[serde(default = "default_truncate")]
    pub truncate_at: usize,
    /// strftime pattern for message timestamps.
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            truncate_at: default_truncate(),
            time_format: default_time_format(),
        }
    }
}

// Default value functions for serde
fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_read_timeout() -> u64 {
    2000
}

fn default_write_timeout() -> u64 {
    1000
}

fn default_retry_interval() -> u64 {
    100
}

fn default_poll_interval() -> u64 {
    500
}

fn default_truncate() -> usize {
    120
}

fn default_time_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

/// Get the default configuration path.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| ChatlogError::Unsupported {
        feature: "config directory discovery".to_string(),
    })?;

    Ok(config_dir.join("chatlog-watch").join("config.toml"))
}

/// Get the default log folder (`<documents>/LyncLog`, falling back to home).
pub fn default_log_folder() -> Result<PathBuf> {
    let base = dirs::document_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| ChatlogError::Unsupported {
            feature: "documents directory discovery".to_string(),
        })?;

    Ok(base.join(DEFAULT_LOG_FOLDER_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.extension, "xml");
        assert_eq!(config.store.read_timeout(), Duration::from_millis(2000));
        assert_eq!(config.store.write_timeout(), Duration::from_millis(1000));
        assert_eq!(config.watch.backend, WatchBackend::Notify);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.log_folder = Some(dir.path().join("logs"));
        config.watch.backend = WatchBackend::Poll;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_folder = "/tmp/chat"

[store]
read_timeout_ms = 500
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_folder, Some(PathBuf::from("/tmp/chat")));
        assert_eq!(config.store.read_timeout_ms, 500);
        assert_eq!(config.store.write_timeout_ms, 1000);
        assert_eq!(config.store.extension, "xml");
    }

    #[test]
    fn test_invalid_extension_rejected() {
        let mut config = Config::default();
        config.store.extension = ".xml".to_string();
        assert!(matches!(
            config.validate(),
            Err(ChatlogError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_resolved_log_folder_prefers_explicit() {
        let mut config = Config::default();
        config.log_folder = Some(PathBuf::from("/srv/logs"));
        assert_eq!(config.resolved_log_folder().unwrap(), PathBuf::from("/srv/logs"));
    }
}
