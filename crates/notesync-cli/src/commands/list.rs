use notesync_core::Replica;

use crate::commands::common::{
    format_replica_lines, replica_to_list_item, CliContext, ReplicaListItem,
};
use crate::error::CliError;

pub async fn list_replicas(limit: usize, ctx: &CliContext) -> Result<Vec<Replica>, CliError> {
    let user_id = ctx.user_id()?;
    let store = ctx.open_store().await?;
    let mut replicas = store.list_active(&user_id).await?;
    replicas.truncate(limit);
    Ok(replicas)
}

pub async fn run_list(limit: usize, as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let replicas = list_replicas(limit, ctx).await?;

    if as_json {
        let json_items = replicas
            .iter()
            .map(replica_to_list_item)
            .collect::<Vec<ReplicaListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_replica_lines(&replicas) {
            println!("{line}");
        }
    }

    Ok(())
}
