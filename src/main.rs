//! `chatlog`: browse, search and follow a folder of conversation logs.

use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let Err(err) = chatlog_watch::cli::run() else {
        return ExitCode::SUCCESS;
    };

    eprintln!("chatlog: {err}");
    let mut cause = err.source();
    while let Some(inner) = cause {
        eprintln!("  caused by: {inner}");
        cause = inner.source();
    }

    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}
