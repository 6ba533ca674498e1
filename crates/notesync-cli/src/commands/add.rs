use crate::commands::common::{normalize_title, CliContext};
use crate::error::CliError;

pub async fn run_add(
    title: &str,
    content_parts: &[String],
    ctx: &CliContext,
) -> Result<(), CliError> {
    let title = normalize_title(title)?;
    let content = content_parts.join(" ").trim().to_string();
    let user_id = ctx.user_id()?;

    let store = ctx.open_store().await?;
    let replica = store.create_offline(&user_id, &title, &content).await?;

    println!("{}", replica.id);
    Ok(())
}
