//! Command-line interface for chatlog-watch.
//!
//! Provides scriptable access to a conversation log folder:
//! - `list`: List conversations, newest first
//! - `show`: Print one conversation
//! - `search`: Filter and step through matches
//! - `watch`: Follow the folder and report changes
//! - `record`: Append a message to a conversation log
//! - `id`: Show the file-safe identifier for a conversation
//! - `config`: Show or create the configuration file

mod commands;

pub use commands::*;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

use crate::error::Result;

/// Live, searchable view over a folder of conversation logs.
#[derive(Debug, Parser)]
#[command(name = "chatlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Conversation log folder (default: ~/Documents/LyncLog).
    #[arg(short = 'f', long, global = true, env = "CHATLOG_FOLDER")]
    pub folder: Option<PathBuf>,

    /// Output format for structured data.
    #[arg(short = 'o', long, global = true, default_value = "text", env = "CHATLOG_OUTPUT")]
    pub output: OutputFormat,

    /// Suppress non-essential output.
    #[arg(short = 'q', long, global = true, env = "CHATLOG_QUIET")]
    pub quiet: bool,

    /// Output as JSON (shorthand for -o json).
    #[arg(long, global = true, env = "CHATLOG_JSON")]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn", env = "CHATLOG_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log format (text, json, compact, pretty).
    #[arg(long, global = true, default_value = "text", env = "CHATLOG_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Path to custom configuration file.
    #[arg(long, global = true, env = "CHATLOG_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Log level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    #[default]
    Warn,
    /// Errors, warnings, and informational messages.
    Info,
    /// All of the above plus debug messages.
    Debug,
    /// All messages including trace-level details.
    Trace,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// Structured JSON format for machine consumption.
    Json,
    /// Compact single-line format.
    Compact,
    /// Pretty format with full details.
    Pretty,
}

impl LogLevel {
    /// Convert to tracing filter level.
    #[must_use]
    pub fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl Cli {
    /// Get effective output format.
    #[must_use]
    pub fn effective_output(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.output
        }
    }
}

/// Output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Compact single-line output.
    Compact,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List conversations, newest first.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Print one conversation.
    #[command(alias = "cat")]
    Show(ShowArgs),

    /// Filter messages and step through the matches.
    #[command(alias = "s", alias = "find")]
    Search(SearchArgs),

    /// Follow the folder and report changes as they happen.
    #[command(alias = "tail")]
    Watch(WatchArgs),

    /// Append a message to a conversation log.
    Record(RecordArgs),

    /// Show the file-safe identifier for a conversation.
    Id(IdArgs),

    /// View or create the configuration file.
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Arguments for the list command.
#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Only list conversations with a message matching this text.
    #[arg(short = 'F', long)]
    pub filter: Option<String>,

    /// Limit number of results.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Show file paths.
    #[arg(long)]
    pub paths: bool,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Conversation id, file name or path.
    pub conversation: String,

    /// Highlight messages matching this text.
    #[arg(short = 'F', long)]
    pub filter: Option<String>,
}

/// Arguments for the search command.
#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Text to search for (case-insensitive, bodies and contact names).
    pub text: String,

    /// Step through matches backward after the first one.
    #[arg(short = 'b', long)]
    pub backward: bool,

    /// Number of matches to visit (default: one full cycle).
    #[arg(short = 'n', long)]
    pub steps: Option<usize>,
}

/// Arguments for the watch command.
#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Keep this filter applied while watching.
    #[arg(short = 'F', long)]
    pub filter: Option<String>,

    /// Poll the folder instead of using native notifications.
    #[arg(long)]
    pub poll: bool,

    /// Polling interval in milliseconds (implies --poll).
    #[arg(long)]
    pub interval: Option<u64>,

    /// Stop after this many seconds (default: run until interrupted).
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the record command.
#[derive(Debug, Parser)]
pub struct RecordArgs {
    /// External conversation identifier.
    pub conversation: String,

    /// Sender display name.
    pub contact: String,

    /// Message text.
    pub text: String,

    /// Mark the message as sent by the local user.
    #[arg(long)]
    pub outgoing: bool,

    /// Sender e-mail address.
    #[arg(long)]
    pub email: Option<String>,
}

/// Arguments for the id command.
#[derive(Debug, Parser)]
pub struct IdArgs {
    /// External conversation identifier.
    pub value: String,

    /// Print the full log file path instead.
    #[arg(long)]
    pub path: bool,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Config action.
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config actions.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Print the configuration file path.
    Path,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the completions command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// PowerShell.
    Powershell,
    /// Elvish shell.
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::Powershell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Generate shell completions and print to stdout.
pub fn generate_completions(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let shell: Shell = shell.into();
    generate(shell, &mut cmd, "chatlog", &mut io::stdout());
}

/// Initialize logging based on CLI options.
fn init_logging(cli: &Cli) {
    use tracing_subscriber::{
        fmt::{self, format::FmtSpan},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_filter_string()));

    let result = match cli.log_format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("Warning: Could not initialize logging: {e}");
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    match &cli.command {
        Commands::List(args) => commands::list::run(&cli, args),
        Commands::Show(args) => commands::show::run(&cli, args),
        Commands::Search(args) => commands::search::run(&cli, args),
        Commands::Watch(args) => commands::watch::run(&cli, args),
        Commands::Record(args) => commands::record::run(&cli, args),
        Commands::Id(args) => commands::id::run(&cli, args),
        Commands::Config(args) => commands::config::run(&cli, args),
        Commands::Completions(args) => {
            generate_completions(args.shell);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_json_flag_overrides_output() {
        let cli = Cli::parse_from(["chatlog", "--json", "list"]);
        assert_eq!(cli.effective_output(), OutputFormat::Json);

        let cli = Cli::parse_from(["chatlog", "-o", "compact", "list"]);
        assert_eq!(cli.effective_output(), OutputFormat::Compact);
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::parse_from(["chatlog", "search", "hello", "--backward", "-n", "3"]);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.text, "hello");
                assert!(args.backward);
                assert_eq!(args.steps, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_log_format_parsing() {
        let cli = Cli::parse_from(["chatlog", "list"]);
        assert_eq!(cli.log_format, LogFormat::Text);

        for (arg, expected) in [
            ("json", LogFormat::Json),
            ("compact", LogFormat::Compact),
            ("pretty", LogFormat::Pretty),
        ] {
            let cli = Cli::parse_from(["chatlog", "--log-format", arg, "list"]);
            assert_eq!(cli.log_format, expected, "--log-format {arg}");
        }

        assert!(Cli::try_parse_from(["chatlog", "--log-format", "xml", "list"]).is_err());
    }

    #[test]
    fn test_log_level_to_filter() {
        assert_eq!(LogLevel::Error.to_filter_string(), "error");
        assert_eq!(LogLevel::Warn.to_filter_string(), "warn");
        assert_eq!(LogLevel::Info.to_filter_string(), "info");
        assert_eq!(LogLevel::Debug.to_filter_string(), "debug");
        assert_eq!(LogLevel::Trace.to_filter_string(), "trace");
    }
}
