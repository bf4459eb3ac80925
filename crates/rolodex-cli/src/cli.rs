use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "rolodex")]
#[command(about = "Mirror your remote address book into a local contact store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull contacts from the remote address book
    Sync {
        /// Ignore the stored cursor and mirror everything
        #[arg(long, conflicts_with = "incremental")]
        full: bool,
        /// Only apply changes since the last completed sync
        #[arg(long)]
        incremental: bool,
        /// Output statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the state of the last sync and local counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List contacts by name
    List {
        /// Number of contacts to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Number of contacts to skip
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search contacts by name, organization or phone number
    Search {
        /// Search query
        query: String,
        /// Number of contacts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one contact by remote identifier (e.g. people/c123)
    Show {
        external_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

/// Strategy requested on the command line
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncMode {
    Auto,
    Full,
    Incremental,
}

impl SyncMode {
    pub const fn from_flags(full: bool, incremental: bool) -> Self {
        match (full, incremental) {
            (true, _) => Self::Full,
            (false, true) => Self::Incremental,
            (false, false) => Self::Auto,
        }
    }
}
