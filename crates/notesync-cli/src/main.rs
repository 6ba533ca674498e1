//! notesync CLI - offline-first notes from the command line
//!
//! Every edit lands in the local replica first; `notesync sync` reconciles
//! it with the remote notes table.

mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::resolve::run_resolve;
use crate::commands::sync::{run_conflicts, run_status, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let default_directive = "notesync=info"
        .parse::<tracing_subscriber::filter::Directive>()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_directive),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Config { command } => run_config(command, cli.profile.as_deref()),
        command => {
            let ctx = CliContext::new(cli.db_path, cli.profile, cli.user)?;
            run_store_command(command, &ctx).await
        }
    }
}

async fn run_store_command(command: Commands, ctx: &CliContext) -> Result<(), CliError> {
    match command {
        Commands::Add { title, content } => run_add(&title, &content, ctx).await,
        Commands::List { limit, json } => run_list(limit, json, ctx).await,
        Commands::Edit { id, title, content } => {
            run_edit(&id, title.as_deref(), content.as_deref(), ctx).await
        }
        Commands::Delete { id } => run_delete(&id, ctx).await,
        Commands::Sync { watch } => run_sync(watch, ctx).await,
        Commands::Conflicts { json } => run_conflicts(json, ctx).await,
        Commands::Resolve {
            id,
            strategy,
            title,
            content,
        } => run_resolve(&id, strategy, title, content, ctx).await,
        Commands::Status { json } => run_status(json, ctx).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Config { command } => run_config(command, ctx.profile.as_deref()),
    }
}
