//! CLI command implementations.
//!
//! Each command is implemented in its own module with a `run` function
//! that handles the command logic.

pub mod config;
pub mod id;
pub mod list;
pub mod record;
pub mod search;
pub mod show;
pub mod watch;

use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::store::DocumentStore;
use crate::viewer::LogViewer;

/// Load the configuration named by `--config`, or the default one, and
/// apply the `--folder` override.
///
/// An explicit `--config` that cannot be read is an error; a broken default
/// file only produces a warning.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable configuration file");
            Config::default()
        }),
    };
    if let Some(folder) = &cli.folder {
        config.log_folder = Some(folder.clone());
    }
    Ok(config)
}

/// The effective log folder.
pub fn log_folder(config: &Config) -> Result<PathBuf> {
    config.resolved_log_folder()
}

/// Open a viewer over the configured folder (no watching).
pub fn open_viewer(cli: &Cli) -> Result<(Config, LogViewer)> {
    let config = load_config(cli)?;
    let viewer = LogViewer::open_folder(log_folder(&config)?, DocumentStore::new(&config.store))?;
    Ok((config, viewer))
}
