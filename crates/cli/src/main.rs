// authorlink CLI - link guest authors to registered user accounts
// Operates on a JSON snapshot of the author store and user directory.

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use authorlink_recon::{CriterionKind, ReconError, UpdateMode};
use clap::{Args, Parser, Subcommand, ValueEnum};

use exit_codes::{recon_exit_code, EXIT_STORE_SNAPSHOT, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "authorlink")]
#[command(about = "Link guest authors to registered user accounts")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log more (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that opens the store.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// JSON snapshot holding authors, term meta and users
    #[arg(long, short = 's')]
    pub snapshot: PathBuf,

    /// Path to authorlink.toml (defaults apply when omitted)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Request token, required when the config sets auth.token
    #[arg(long, env = "AUTHORLINK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Output JSON to stdout instead of human summary
    #[arg(long)]
    pub json: bool,

    /// Do not write the snapshot back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Write the link only
    LinkOnly,
    /// Also copy the user's display name, email, URL and bio onto the author
    SyncFields,
}

impl From<ModeArg> for UpdateMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::LinkOnly => UpdateMode::LinkOnly,
            ModeArg::SyncFields => UpdateMode::SyncFields,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ByArg {
    Email,
    Username,
    DisplayName,
}

impl From<ByArg> for CriterionKind {
    fn from(by: ByArg) -> Self {
        match by {
            ByArg::Email => CriterionKind::Email,
            ByArg::Username => CriterionKind::Username,
            ByArg::DisplayName => CriterionKind::DisplayName,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the total number of authors
    #[command(after_help = "\
Examples:
  authorlink count -s site.json
  authorlink count -s site.json --json")]
    Count {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Reconcile one page of authors by email
    #[command(after_help = "\
Examples:
  authorlink batch -s site.json --offset 0 --limit 50
  authorlink batch -s site.json --offset 50 --limit 50 --json
  authorlink batch -s site.json --mode sync-fields")]
    Batch {
        #[command(flatten)]
        store: StoreArgs,

        /// First author of the page
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Page size (defaults to batch.limit from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Overwrite links to other users (only honoured with policy.bulk_respects_force)
        #[arg(long)]
        force: bool,

        #[arg(long, value_enum, default_value = "link-only")]
        mode: ModeArg,
    },

    /// Reconcile every author, page by page
    #[command(after_help = "\
Examples:
  authorlink run -s site.json
  authorlink run -s site.json --limit 100 --max-pages 3")]
    Run {
        #[command(flatten)]
        store: StoreArgs,

        /// Page size (defaults to batch.limit from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Overwrite links to other users (only honoured with policy.bulk_respects_force)
        #[arg(long)]
        force: bool,

        #[arg(long, value_enum, default_value = "link-only")]
        mode: ModeArg,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Reconcile all authors matching one user
    #[command(after_help = "\
Examples:
  authorlink target -s site.json --by email jane@example.com
  authorlink target -s site.json --by username jdoe --force
  authorlink target -s site.json --by display-name \"Jane Doe\" --mode sync-fields")]
    Target {
        #[command(flatten)]
        store: StoreArgs,

        /// How to look up the user
        #[arg(long, value_enum)]
        by: ByArg,

        /// Email, login or display name of the user
        value: String,

        /// Overwrite links to other users
        #[arg(long)]
        force: bool,

        #[arg(long, value_enum, default_value = "link-only")]
        mode: ModeArg,

        /// Print the per-author trace even on success
        #[arg(long)]
        trace: bool,
    },

    /// Link selected unlinked authors by their verified email
    #[command(after_help = "\
Examples:
  authorlink auto-map -s site.json 11 12 13")]
    AutoMap {
        #[command(flatten)]
        store: StoreArgs,

        /// Author ids to consider
        #[arg(required = true)]
        authors: Vec<u64>,
    },

    /// Validate an authorlink.toml without running
    #[command(after_help = "\
Examples:
  authorlink validate-config authorlink.toml")]
    ValidateConfig {
        /// Path to the config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("AUTHORLINK_COMMIT"), ")",
            "\nengine:  authorlink-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("AUTHORLINK_COMMIT"), ")",
            "\nengine:  authorlink-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
        )
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Count { store } => recon::cmd_count(store),
        Commands::Batch { store, offset, limit, force, mode } => {
            recon::cmd_batch(store, offset, limit, force, mode.into())
        }
        Commands::Run { store, limit, force, mode, max_pages } => {
            recon::cmd_run(store, limit, force, mode.into(), max_pages)
        }
        Commands::Target { store, by, value, force, mode, trace } => {
            recon::cmd_target(store, by.into(), value, force, mode.into(), trace)
        }
        Commands::AutoMap { store, authors } => recon::cmd_auto_map(store, authors),
        Commands::ValidateConfig { config } => recon::cmd_validate_config(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORE_SNAPSHOT, message: msg.into(), hint: None }
    }

    /// Create error from an engine error with the matching exit code.
    pub fn recon(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::SecurityCheckFailed => {
                Some("pass --token or set AUTHORLINK_TOKEN to the configured auth.token".to_string())
            }
            ReconError::AmbiguousMatch { .. } => {
                Some("use --by email or --by username to pick a single user".to_string())
            }
            ReconError::NoMatchingAuthors { .. } => {
                Some("nothing was written; the trace above shows what each author offered".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
