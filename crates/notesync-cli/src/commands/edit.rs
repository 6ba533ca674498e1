use crate::commands::common::{
    normalize_note_identifier, normalize_title, resolve_note, CliContext,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<&str>,
    content: Option<&str>,
    ctx: &CliContext,
) -> Result<(), CliError> {
    if title.is_none() && content.is_none() {
        return Err(CliError::NothingToEdit);
    }

    let normalized_id = normalize_note_identifier(id)?;
    let user_id = ctx.user_id()?;
    let store = ctx.open_store().await?;
    let replica = resolve_note(&normalized_id, &user_id, &store).await?;

    let new_title = match title {
        Some(title) => normalize_title(title)?,
        None => replica.title.clone(),
    };
    let new_content = content.map_or_else(|| replica.content.clone(), str::to_string);

    if new_title == replica.title && new_content == replica.content {
        println!("{}", replica.id);
        return Ok(());
    }

    let updated = store
        .update_content(&replica.id, &new_title, &new_content)
        .await?;
    println!("{}", updated.id);
    Ok(())
}
