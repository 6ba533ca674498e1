use notesync_core::ConflictDecision;

use crate::cli::ResolveStrategy;
use crate::commands::common::{normalize_note_identifier, resolve_note, CliContext};
use crate::error::CliError;

pub fn build_decision(
    note_id: notesync_core::NoteId,
    strategy: ResolveStrategy,
    title: Option<String>,
    content: Option<String>,
) -> Result<ConflictDecision, CliError> {
    match strategy {
        ResolveStrategy::Local => Ok(ConflictDecision::keep_local(note_id)),
        ResolveStrategy::Remote => Ok(ConflictDecision::keep_remote(note_id)),
        ResolveStrategy::Merge => {
            let (Some(title), Some(content)) = (title, content) else {
                return Err(CliError::Config(
                    "merge requires both --title and --content".to_string(),
                ));
            };
            Ok(ConflictDecision::merge(note_id, title, content))
        }
    }
}

pub async fn run_resolve(
    id: &str,
    strategy: ResolveStrategy,
    title: Option<String>,
    content: Option<String>,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let user_id = ctx.user_id()?;
    let engine = ctx.open_engine().await?;
    let replica = resolve_note(&normalized_id, &user_id, engine.store()).await?;

    let decision = build_decision(replica.id, strategy, title, content)?;
    let Some(resolved) = engine.resolve(&decision, &user_id).await? else {
        return Err(CliError::NoOpenConflict(replica.id.to_string()));
    };

    println!("{}", resolved.id);
    Ok(())
}
