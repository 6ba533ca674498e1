use crate::commands::common::{normalize_note_identifier, resolve_note, CliContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, ctx: &CliContext) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let user_id = ctx.user_id()?;
    let store = ctx.open_store().await?;
    let replica = resolve_note(&normalized_id, &user_id, &store).await?;

    store.tombstone(&replica.id).await?;
    println!("{}", replica.id);
    Ok(())
}
