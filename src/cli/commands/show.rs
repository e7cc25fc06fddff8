//! Show command implementation.
//!
//! Prints one conversation, with optional match highlighting.

use std::io::{self, Write};

use crate::cli::{Cli, OutputFormat, ShowArgs};
use crate::error::{ChatlogError, Result};
use crate::util::truncate;

use super::open_viewer;

/// Run the show command.
pub fn run(cli: &Cli, args: &ShowArgs) -> Result<()> {
    let (config, viewer) = open_viewer(cli)?;

    let id = viewer
        .state()
        .registry()
        .find(&args.conversation)
        .map(|e| e.id())
        .ok_or_else(|| ChatlogError::ConversationNotFound {
            query: args.conversation.clone(),
        })?;

    if let Some(filter) = &args.filter {
        viewer.set_filter(filter);
    }
    let snapshot = viewer.snapshot();
    let doc = snapshot
        .documents
        .iter()
        .find(|d| d.id == id)
        .ok_or_else(|| ChatlogError::ConversationNotFound {
            query: args.conversation.clone(),
        })?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    match cli.effective_output() {
        OutputFormat::Json => {
            writeln!(writer, "{}", serde_json::to_string_pretty(doc)?)?;
        }
        OutputFormat::Compact => {
            for message in &doc.messages {
                let contact = message.contact.as_deref().unwrap_or("?");
                writeln!(
                    writer,
                    "{} {}: {}",
                    message.timestamp.format(&config.display.time_format),
                    contact,
                    truncate(&message.text, config.display.truncate_at)
                )?;
            }
        }
        OutputFormat::Text => {
            writeln!(writer, "{}", doc.title)?;
            writeln!(writer, "{}", "=".repeat(doc.title.len()))?;
            if !cli.quiet {
                writeln!(writer, "File: {}", doc.path.display())?;
            }
            writeln!(writer)?;

            for message in &doc.messages {
                let marker = if message.is_match { '*' } else { ' ' };
                let contact = message.contact.as_deref().unwrap_or("?");
                writeln!(
                    writer,
                    "{marker} [{}] {contact}: {}",
                    message.timestamp.format(&config.display.time_format),
                    message.text
                )?;
            }

            if args.filter.is_some() && !cli.quiet {
                writeln!(writer)?;
                writeln!(writer, "{} filter matches", doc.match_count)?;
            }
        }
    }

    Ok(())
}
