//! Watch command implementation.
//!
//! Follows the log folder and prints each registry change with the
//! refreshed status line.

use std::io::{self, Write};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use crate::cli::{Cli, OutputFormat, WatchArgs};
use crate::config::WatchBackend;
use crate::error::Result;
use crate::registry::RegistryEvent;
use crate::util::truncate;
use crate::viewer::LogViewer;

use super::open_viewer;

/// Run the watch command.
pub fn run(cli: &Cli, args: &WatchArgs) -> Result<()> {
    let (mut config, mut viewer) = open_viewer(cli)?;

    if args.poll || args.interval.is_some() {
        config.watch.backend = WatchBackend::Poll;
    }
    if let Some(interval) = args.interval {
        config.watch.poll_interval_ms = interval.max(1);
    }
    if let Some(filter) = &args.filter {
        viewer.set_filter(filter);
    }

    let events = viewer.subscribe();
    viewer.watch_with_config(&config.watch)?;

    let json = cli.effective_output() == OutputFormat::Json;
    if !cli.quiet && !json {
        println!("Watching {} ... (Ctrl+C to stop)", viewer.folder().display());
        println!("{}", viewer.status());
    }

    let deadline = args.timeout.map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        let wait = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) => left,
                None => break,
            },
            None => Duration::from_secs(3600),
        };

        match events.recv_timeout(wait) {
            Ok(event) => report(cli, &viewer, &event, json, config.display.truncate_at)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    viewer.shutdown();
    Ok(())
}

/// Print one registry event.
fn report(cli: &Cli, viewer: &LogViewer, event: &RegistryEvent, json: bool, truncate_at: usize) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    if json {
        writeln!(writer, "{}", serde_json::to_string(event)?)?;
        return Ok(());
    }

    let state = viewer.state();
    let registry = state.registry();
    let line = match event {
        RegistryEvent::Inserted { id, .. } => registry
            .get(*id)
            .map(|e| format!("+ {} ({} messages)", e.conversation().id, e.messages().len())),
        RegistryEvent::Updated { id, diff, .. } if !diff.is_unchanged() => registry.get(*id).map(|e| {
            let latest = e
                .messages()
                .last()
                .map(|m| truncate(&m.to_string(), truncate_at))
                .unwrap_or_default();
            format!("~ {} (+{} -{}) {latest}", e.conversation().id, diff.added, diff.dropped)
        }),
        RegistryEvent::Removed { path, .. } => Some(format!("- {}", path.display())),
        _ => None,
    };

    if let Some(line) = line {
        writeln!(writer, "{line}")?;
        if !cli.quiet {
            writeln!(writer, "  {}", state.status())?;
        }
    }
    Ok(())
}
