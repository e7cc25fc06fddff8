//! Record command implementation.

use crate::cli::{Cli, OutputFormat, RecordArgs};
use crate::error::Result;
use crate::model::Direction;
use crate::recorder::{ConversationRecorder, NewMessage};
use crate::store::DocumentStore;

use super::{load_config, log_folder};

/// Run the record command.
pub fn run(cli: &Cli, args: &RecordArgs) -> Result<()> {
    let config = load_config(cli)?;
    let folder = log_folder(&config)?;
    let store = DocumentStore::new(&config.store);

    let mut recorder = ConversationRecorder::open(store, &folder, &args.conversation)?;
    let direction = if args.outgoing {
        Direction::Outgoing
    } else {
        Direction::Incoming
    };
    let mut message = NewMessage::new(args.contact.clone(), args.text.clone()).with_direction(direction);
    if let Some(email) = &args.email {
        message = message.with_email(email.clone());
    }

    let recorded = recorder.record(message)?;

    match cli.effective_output() {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "recorded": recorded,
                "path": recorder.path().display().to_string(),
                "messages": recorder.conversation().len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            if !recorded {
                if !cli.quiet {
                    println!("Nothing recorded: message text is empty.");
                }
            } else if !cli.quiet {
                println!(
                    "Recorded message {} in {}",
                    recorder.conversation().len(),
                    recorder.path().display()
                );
            }
        }
    }

    Ok(())
}
