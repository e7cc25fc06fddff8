//! Config command implementation.
//!
//! View and create the chatlog-watch configuration file.

use std::path::PathBuf;

use crate::cli::{Cli, ConfigAction, ConfigArgs, OutputFormat};
use crate::config::{default_config_path, Config};
use crate::error::{ChatlogError, Result};

use super::load_config;

/// Run the config command.
pub fn run(cli: &Cli, args: &ConfigArgs) -> Result<()> {
    match args.action.clone().unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_config_path(cli),
        ConfigAction::Init { force } => init_config(cli, force),
    }
}

/// The file `--config` points at, or the default location.
fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => default_config_path(),
    }
}

/// Show the effective configuration.
fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    match cli.effective_output() {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        _ => {
            let folder = config.resolved_log_folder()?;
            println!("chatlog-watch Configuration");
            println!("===========================\n");

            println!("log_folder = \"{}\"", folder.display());
            println!();

            println!("[store]");
            println!("  extension = \"{}\"", config.store.extension);
            println!("  read_timeout_ms = {}", config.store.read_timeout_ms);
            println!("  write_timeout_ms = {}", config.store.write_timeout_ms);
            println!("  retry_interval_ms = {}", config.store.retry_interval_ms);
            println!();

            println!("[watch]");
            println!("  backend = \"{:?}\"", config.watch.backend);
            println!("  poll_interval_ms = {}", config.watch.poll_interval_ms);
            println!();

            println!("[display]");
            println!("  truncate_at = {}", config.display.truncate_at);
            println!("  time_format = \"{}\"", config.display.time_format);
        }
    }

    Ok(())
}

/// Show the configuration file path.
fn show_config_path(cli: &Cli) -> Result<()> {
    let path = config_path(cli)?;
    println!("{}", path.display());

    if !cli.quiet {
        if path.exists() {
            println!("(file exists)");
        } else {
            println!("(file does not exist, using defaults)");
        }
    }

    Ok(())
}

/// Write a default configuration file.
fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = config_path(cli)?;

    if path.exists() && !force {
        return Err(ChatlogError::ConfigError {
            message: format!(
                "Configuration file already exists: {} (use --force to overwrite)",
                path.display()
            ),
        });
    }

    Config::default().save_to(&path)?;
    if !cli.quiet {
        println!("Created configuration file: {}", path.display());
    }

    Ok(())
}
