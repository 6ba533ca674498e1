use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use notesync_core::config::ACCESS_TOKEN_ENV;
use notesync_core::{
    NoteId, RemoteConfig, RemoteNotes, Replica, ReplicaStore, SupabaseNotesClient, SyncConfig,
    SyncEngine,
};
use serde::Serialize;

use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub const DB_PATH_ENV: &str = "NOTESYNC_DB_PATH";
pub const USER_ID_ENV: &str = "NOTESYNC_USER_ID";

/// Global options shared by every command
#[derive(Debug, Clone, Default)]
pub struct CliContext {
    pub db_path: PathBuf,
    pub profile: Option<String>,
    pub user: Option<String>,
}

impl CliContext {
    pub fn new(
        db_path: Option<PathBuf>,
        profile: Option<String>,
        user: Option<String>,
    ) -> Result<Self, CliError> {
        Ok(Self {
            db_path: resolve_db_path(db_path)?,
            profile,
            user,
        })
    }

    pub async fn open_store(&self) -> Result<ReplicaStore, CliError> {
        Ok(ReplicaStore::open(self.db_path.clone()).await?)
    }

    /// Owner id from `--user`, `NOTESYNC_USER_ID`, then the active profile.
    pub fn user_id(&self) -> Result<String, CliError> {
        if let Some(user) = normalize_text_option(self.user.clone())
            .or_else(|| normalize_text_option(env::var(USER_ID_ENV).ok()))
        {
            return Ok(user);
        }

        let config = CliProfilesConfig::load()?;
        let profile_name = config.resolve_profile_name(self.profile.as_deref());
        config
            .profile(&profile_name)
            .and_then(|profile| profile.user_id())
            .ok_or(CliError::UserNotConfigured)
    }

    /// Remote settings from the environment, falling back to the profile.
    pub fn remote_config(&self) -> Result<Option<RemoteConfig>, CliError> {
        if let Some(config) = RemoteConfig::from_env()? {
            return Ok(Some(config));
        }

        let config = CliProfilesConfig::load()?;
        let profile_name = config.resolve_profile_name(self.profile.as_deref());
        let Some(profile) = config.profile(&profile_name) else {
            return Ok(None);
        };
        Ok(RemoteConfig::from_parts(
            profile.supabase_url(),
            profile.supabase_anon_key(),
            env::var(ACCESS_TOKEN_ENV).ok(),
        )?)
    }

    /// Engine over the local store and the configured remote service.
    pub async fn open_engine(&self) -> Result<SyncEngine, CliError> {
        let remote_config = self
            .remote_config()?
            .filter(|config| config.access_token.is_some())
            .ok_or(CliError::SyncNotConfigured)?;
        let client = SupabaseNotesClient::from_config(&remote_config)
            .map_err(|error| CliError::Config(error.to_string()))?;
        tracing::debug!("Remote notes at {}", remote_config.supabase_url);

        let store = self.open_store().await?;
        Ok(SyncEngine::new(
            store,
            Arc::new(client) as Arc<dyn RemoteNotes>,
            SyncConfig::default(),
        ))
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("notesync").join("notesync.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    normalize_text_option(Some(title.to_string())).ok_or(CliError::EmptyTitle)
}

/// Find the active replica owned by `user_id` whose id equals or starts
/// with `note_query`.
pub async fn resolve_note(
    note_query: &str,
    user_id: &str,
    store: &ReplicaStore,
) -> Result<Replica, CliError> {
    let owned = |replica: Replica| (replica.user_id == user_id).then_some(replica);

    if let Ok(note_id) = note_query.parse::<NoteId>() {
        if let Some(replica) = store.get_active(&note_id).await?.and_then(owned) {
            return Ok(replica);
        }
    }

    let matching_ids = store
        .list_ids_by_prefix(user_id, &note_query.to_lowercase(), 3)
        .await?;

    match matching_ids.as_slice() {
        [] => Err(CliError::NoteNotFound(note_query.to_string())),
        [only] => {
            let resolved_id = only
                .parse::<NoteId>()
                .map_err(|_| CliError::NoteNotFound(note_query.to_string()))?;
            store
                .get_active(&resolved_id)
                .await?
                .and_then(owned)
                .ok_or_else(|| CliError::NoteNotFound(note_query.to_string()))
        }
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplicaListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub inserted_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub is_synced: bool,
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub note_id: String,
    pub title: String,
    pub local_updated_at: i64,
    pub local_updated_at_iso: String,
    pub remote_inserted_at: Option<i64>,
    pub remote_inserted_at_iso: Option<String>,
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn replica_to_list_item(replica: &Replica) -> ReplicaListItem {
    let now_ms = Utc::now().timestamp_millis();
    ReplicaListItem {
        id: replica.id.to_string(),
        title: replica.title.clone(),
        preview: content_preview(&replica.content, 80),
        content: replica.content.clone(),
        inserted_at: replica.inserted_at,
        updated_at: replica.updated_at,
        relative_time: format_relative_time(replica.updated_at, now_ms),
        is_synced: replica.is_synced,
    }
}

pub fn conflict_to_item(replica: &Replica) -> ConflictItem {
    ConflictItem {
        note_id: replica.id.to_string(),
        title: replica.title.clone(),
        local_updated_at: replica.updated_at,
        local_updated_at_iso: format_timestamp(replica.updated_at),
        remote_inserted_at: replica.conflict_version,
        remote_inserted_at_iso: replica.conflict_version.map(format_timestamp),
    }
}

/// One line per replica; `*` marks changes not yet confirmed remotely.
pub fn format_replica_lines(replicas: &[Replica]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    replicas
        .iter()
        .map(|replica| {
            let short_id = short_id(&replica.id.to_string());
            let marker = if replica.is_synced { ' ' } else { '*' };
            let title = content_preview(&replica.title, 40);
            let relative_time = format_relative_time(replica.updated_at, now_ms);
            format!("{marker} {short_id:<13}  {title:<40}  {relative_time}")
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[Replica]) -> Vec<String> {
    conflicts
        .iter()
        .map(|replica| {
            let remote = replica
                .conflict_version
                .map_or_else(|| "unknown".to_string(), format_timestamp);
            format!(
                "{}  {:<40}  local={}  remote={}",
                short_id(&replica.id.to_string()),
                content_preview(&replica.title, 40),
                format_timestamp(replica.updated_at),
                remote
            )
        })
        .collect()
}

pub fn content_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
