//! List command implementation.
//!
//! Lists conversations in registry order, optionally narrowed by a filter.

use std::io::{self, Write};

use serde::Serialize;

use crate::cli::{Cli, ListArgs, OutputFormat};
use crate::error::Result;
use crate::viewer::DocumentView;

use super::open_viewer;

/// One row of the listing.
#[derive(Debug, Serialize)]
struct ConversationInfo<'a> {
    id: &'a str,
    started: String,
    messages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<usize>,
    path: String,
}

impl<'a> ConversationInfo<'a> {
    fn new(doc: &'a DocumentView, filtered: bool) -> Self {
        Self {
            id: &doc.conversation_id,
            started: doc.started.to_rfc3339(),
            messages: doc.messages.len(),
            matches: filtered.then_some(doc.match_count),
            path: doc.path.display().to_string(),
        }
    }
}

/// Run the list command.
pub fn run(cli: &Cli, args: &ListArgs) -> Result<()> {
    let (config, viewer) = open_viewer(cli)?;
    if let Some(filter) = &args.filter {
        viewer.set_filter(filter);
    }
    let snapshot = viewer.snapshot();
    let filtered = snapshot.filter.is_some();

    let mut docs: Vec<&DocumentView> = snapshot.visible().collect();
    if let Some(limit) = args.limit {
        docs.truncate(limit);
    }

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    match cli.effective_output() {
        OutputFormat::Json => {
            let output: Vec<_> = docs.iter().map(|d| ConversationInfo::new(d, filtered)).collect();
            writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Compact => {
            for doc in &docs {
                writeln!(writer, "{}", doc.conversation_id)?;
            }
        }
        OutputFormat::Text => {
            if docs.is_empty() {
                writeln!(writer, "No conversations found.")?;
                return Ok(());
            }

            for doc in &docs {
                let started = doc.started.format(&config.display.time_format);
                let mut line = format!("  {started}  {:<32} {:>5} messages", doc.conversation_id, doc.messages.len());
                if filtered {
                    line.push_str(&format!(", {} matches", doc.match_count));
                }
                writeln!(writer, "{line}")?;
                if args.paths {
                    writeln!(writer, "    {}", doc.path.display())?;
                }
            }

            if !cli.quiet {
                writeln!(writer)?;
                writeln!(writer, "{}", snapshot.status)?;
            }
        }
    }

    Ok(())
}
