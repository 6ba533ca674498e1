use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "notesync")]
#[command(about = "Offline-first notes with two-way sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local replica database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Owner id of the notes to operate on
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a note offline
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Note content
        content: Vec<String>,
    },
    /// List notes, newest edit first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replacement title
        #[arg(long)]
        title: Option<String>,
        /// Replacement content
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Reconcile the local replica with the remote notes table
    Sync {
        /// Keep syncing on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// List open sync conflicts
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve an open sync conflict
    Resolve {
        /// Note ID or unique ID prefix
        id: String,
        /// Which version survives
        #[arg(value_enum)]
        strategy: ResolveStrategy,
        /// Merged title (merge only)
        #[arg(long, required_if_eq("strategy", "merge"))]
        title: Option<String>,
        /// Merged content (merge only)
        #[arg(long, required_if_eq("strategy", "merge"))]
        content: Option<String>,
    },
    /// Show pending change count
    Status {
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
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolveStrategy {
    /// Push the local version over the remote record
    Local,
    /// Replace the local version with the remote record
    Remote,
    /// Write `--title` and `--content` to both sides
    Merge,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Owner id stored with the profile
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Profile name to show
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
