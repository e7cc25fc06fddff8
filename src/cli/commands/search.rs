//! Search command implementation.
//!
//! Applies a filter and walks the matches the way the navigator does:
//! within the current conversation first, then on to the next one.

use std::io::{self, Write};

use serde::Serialize;

use crate::cli::{Cli, OutputFormat, SearchArgs};
use crate::error::Result;
use crate::navigator::{Cursor, SearchDirection};
use crate::util::truncate;
use crate::viewer::ViewSnapshot;

use super::open_viewer;

/// A visited match.
#[derive(Debug, Serialize)]
struct Hit {
    conversation: String,
    path: String,
    message: usize,
    timestamp: String,
    contact: Option<String>,
    text: String,
}

impl Hit {
    fn resolve(snapshot: &ViewSnapshot, cursor: Cursor) -> Option<Self> {
        let doc = snapshot.documents.iter().find(|d| d.id == cursor.entry)?;
        let message = doc.messages.get(cursor.message)?;
        Some(Self {
            conversation: doc.conversation_id.clone(),
            path: doc.path.display().to_string(),
            message: cursor.message,
            timestamp: message.timestamp.to_rfc3339(),
            contact: message.contact.clone(),
            text: message.text.clone(),
        })
    }
}

/// Run the search command.
pub fn run(cli: &Cli, args: &SearchArgs) -> Result<()> {
    let (config, viewer) = open_viewer(cli)?;
    let direction = if args.backward {
        SearchDirection::Backward
    } else {
        SearchDirection::Forward
    };

    let mut hits = Vec::new();
    if let Some(first) = viewer.set_filter(&args.text) {
        let total = viewer.status().filter_matches.unwrap_or(0);
        let steps = args.steps.unwrap_or(total);

        let mut cursor = Some(first);
        for step in 0..steps {
            if step > 0 {
                cursor = viewer.advance(direction);
            }
            let Some(current) = cursor else { break };
            let snapshot = viewer.snapshot();
            if let Some(hit) = Hit::resolve(&snapshot, current) {
                hits.push(hit);
            }
        }
    }

    let status = viewer.status();
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    match cli.effective_output() {
        OutputFormat::Json => {
            writeln!(writer, "{}", serde_json::to_string_pretty(&hits)?)?;
        }
        OutputFormat::Compact => {
            for hit in &hits {
                writeln!(writer, "{}:{}", hit.conversation, hit.message)?;
            }
        }
        OutputFormat::Text => {
            if hits.is_empty() {
                writeln!(writer, "No matches for \"{}\".", args.text)?;
                return Ok(());
            }

            for hit in &hits {
                let contact = hit.contact.as_deref().unwrap_or("?");
                writeln!(
                    writer,
                    "{}#{}  {}: {}",
                    hit.conversation,
                    hit.message,
                    contact,
                    truncate(&hit.text, config.display.truncate_at)
                )?;
            }

            if !cli.quiet {
                writeln!(writer)?;
                writeln!(writer, "{status}")?;
            }
        }
    }

    Ok(())
}
