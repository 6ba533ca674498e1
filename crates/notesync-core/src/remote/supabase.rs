//! PostgREST client for the Supabase `notes` table.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{RemoteError, RemoteNotes, RemoteResult};
use crate::config::RemoteConfig;
use crate::models::{NewNote, Note, NoteFields, NoteId};
use crate::util::is_http_url;

const NOTES_TABLE: &str = "notes";

#[derive(Clone)]
pub struct SupabaseNotesClient {
    notes_url: String,
    anon_key: String,
    access_token: String,
    client: Client,
}

impl fmt::Debug for SupabaseNotesClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseNotesClient")
            .field("notes_url", &self.notes_url)
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseNotesClient {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "Access token must not be empty",
            ));
        }

        Ok(Self {
            notes_url: format!("{rest_url}/{NOTES_TABLE}"),
            anon_key,
            access_token,
            client: Client::builder().build()?,
        })
    }

    pub fn from_config(config: &RemoteConfig) -> RemoteResult<Self> {
        let access_token = config.access_token.clone().ok_or(
            RemoteError::InvalidConfiguration("An access token is required to reach the notes API"),
        )?;
        Self::new(&config.supabase_url, config.anon_key.clone(), access_token)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorized(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteNotes for SupabaseNotesClient {
    async fn fetch_all(&self, user_id: &str) -> RemoteResult<Vec<Note>> {
        let request = self.client.get(&self.notes_url).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("order", "inserted_at.desc".to_string()),
        ]);
        let response = self.send(request).await?;
        let notes = response.json::<Vec<Note>>().await?;
        tracing::debug!("Fetched {} remote notes for {}", notes.len(), user_id);
        Ok(notes)
    }

    async fn insert(&self, note: &NewNote) -> RemoteResult<Note> {
        let request = self
            .client
            .post(&self.notes_url)
            .header("Prefer", "return=representation")
            .json(note);
        let response = self.send(request).await?;
        let mut inserted = response.json::<Vec<Note>>().await?;
        if inserted.is_empty() {
            return Err(RemoteError::Api(
                "Insert response did not include the stored note".to_string(),
            ));
        }
        Ok(inserted.swap_remove(0))
    }

    async fn update(&self, id: &NoteId, fields: &NoteFields) -> RemoteResult<()> {
        let request = self
            .client
            .patch(&self.notes_url)
            .query(&[("id", format!("eq.{id}"))])
            .json(fields);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> RemoteResult<()> {
        let request = self
            .client
            .delete(&self.notes_url)
            .query(&[("id", format!("eq.{id}"))]);
        self.send(request).await?;
        Ok(())
    }

    async fn get_one(&self, id: &NoteId) -> RemoteResult<Option<Note>> {
        let request = self.client.get(&self.notes_url).query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{id}")),
        ]);
        let response = self.send(request).await?;
        let notes = response.json::<Vec<Note>>().await?;
        Ok(notes.into_iter().next())
    }
}

pub fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.error)
            .or(payload.details)
            .or(payload.hint)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
