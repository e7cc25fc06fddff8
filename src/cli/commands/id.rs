//! Id command implementation.

use crate::cli::{Cli, IdArgs, OutputFormat};
use crate::error::Result;
use crate::store::DocumentStore;
use crate::util::generate_conversation_id;

use super::{load_config, log_folder};

/// Run the id command.
pub fn run(cli: &Cli, args: &IdArgs) -> Result<()> {
    let id = generate_conversation_id(&args.value);

    let path = if args.path {
        let config = load_config(cli)?;
        let store = DocumentStore::new(&config.store);
        Some(store.path_for(&log_folder(&config)?, &args.value))
    } else {
        None
    };

    match cli.effective_output() {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "value": args.value,
                "id": id,
                "path": path.as_ref().map(|p| p.display().to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => match path {
            Some(path) => println!("{}", path.display()),
            None => println!("{id}"),
        },
    }

    Ok(())
}
