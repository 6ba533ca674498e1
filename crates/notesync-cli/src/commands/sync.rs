use notesync_core::{SyncOutcome, SyncStatus};
use serde::Serialize;
use tokio::sync::watch;

use crate::commands::common::{conflict_to_item, format_conflict_lines, CliContext, ConflictItem};
use crate::error::CliError;

pub async fn run_sync(watch_mode: bool, ctx: &CliContext) -> Result<(), CliError> {
    let user_id = ctx.user_id()?;
    let engine = ctx.open_engine().await?;

    if watch_mode {
        let _status_log = engine.status().subscribe(|status| {
            tracing::debug!(
                "Sync status: syncing={} pending={}",
                status.is_syncing,
                status.pending_changes
            );
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stop = async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", error);
            }
            shutdown_tx.send_replace(true);
        };

        println!(
            "Syncing every {}s; press Ctrl-C to stop",
            engine.config().sync_interval.as_secs()
        );
        let (passes, ()) = tokio::join!(engine.run_periodic(&user_id, shutdown_rx), stop);
        println!("Stopped after {passes} sync passes");
        return Ok(());
    }

    let outcome = engine.synchronize(&user_id).await?;
    for line in format_sync_outcome(&outcome) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_outcome(outcome: &SyncOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "Sync completed: {} pushed, {} pulled, {} refreshed, {} purged",
        outcome.synced_count, outcome.pulled_count, outcome.refreshed_count, outcome.purged_count
    )];

    if outcome.has_conflicts() {
        lines.push(format!(
            "{} conflicts need a decision (`notesync resolve <id> local|remote|merge`):",
            outcome.conflicts.len()
        ));
        lines.extend(format_conflict_lines(&outcome.conflicts));
    }
    lines
}

pub async fn run_conflicts(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let user_id = ctx.user_id()?;
    let store = ctx.open_store().await?;
    let conflicts = store.list_conflicts(&user_id).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No open sync conflicts.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub status: SyncStatus,
    pub open_conflicts: usize,
    pub db_path: String,
}

pub async fn run_status(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let user_id = ctx.user_id()?;
    let store = ctx.open_store().await?;

    let report = StatusReport {
        status: SyncStatus {
            is_syncing: false,
            pending_changes: store.count_unsynced(&user_id).await?,
        },
        open_conflicts: store.list_conflicts(&user_id).await?.len(),
        db_path: ctx.db_path.display().to_string(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pending changes: {}", report.status.pending_changes);
        println!("Open conflicts:  {}", report.open_conflicts);
        println!("Database:        {}", report.db_path);
    }
    Ok(())
}
