//! Runtime configuration for the sync engine and the remote client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const ACCESS_TOKEN_ENV: &str = "NOTESYNC_ACCESS_TOKEN";

const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Deadlines and cadence of reconciliation passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Upper bound on fetching the remote snapshot (default: 30 seconds)
    pub snapshot_timeout: Duration,
    /// Upper bound on each per-note or resolution call (default: 15 seconds)
    pub call_timeout: Duration,
    /// Delay between periodic passes (default: 60 seconds)
    pub sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout: DEFAULT_SNAPSHOT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

impl SyncConfig {
    /// Set the snapshot fetch deadline
    #[must_use]
    pub const fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    /// Set the per-call deadline
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the periodic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }
}

/// Where and as whom to reach the remote notes table.
///
/// The URL and anon key are public, build-provisioned values. The access
/// token belongs to a signed-in session and is supplied by the caller.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub supabase_url: String,
    pub anon_key: String,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("supabase_url", &self.supabase_url)
            .field("anon_key", &self.anon_key)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl RemoteConfig {
    pub fn new(supabase_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            anon_key: anon_key.into(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = normalize_text_option(Some(access_token.into()));
        self
    }

    /// Build a config from optional parts, as read from the environment or a
    /// profile file.
    ///
    /// Returns `Ok(None)` when neither URL nor key is present and an error
    /// when only one of them is.
    pub fn from_parts(
        supabase_url: Option<String>,
        anon_key: Option<String>,
        access_token: Option<String>,
    ) -> Result<Option<Self>> {
        let supabase_url = normalize_text_option(supabase_url);
        let anon_key = normalize_text_option(anon_key);

        match (supabase_url, anon_key) {
            (None, None) => Ok(None),
            (Some(supabase_url), Some(anon_key)) => {
                if !is_http_url(&supabase_url) {
                    return Err(Error::Config(format!(
                        "Supabase URL must include http:// or https://: {supabase_url}"
                    )));
                }
                Ok(Some(Self {
                    supabase_url,
                    anon_key,
                    access_token: normalize_text_option(access_token),
                }))
            }
            (Some(_), None) => Err(Error::Config(format!(
                "{SUPABASE_ANON_KEY_ENV} is required when {SUPABASE_URL_ENV} is set"
            ))),
            (None, Some(_)) => Err(Error::Config(format!(
                "{SUPABASE_URL_ENV} is required when {SUPABASE_ANON_KEY_ENV} is set"
            ))),
        }
    }

    /// Read `SUPABASE_URL`, `SUPABASE_ANON_KEY` and `NOTESYNC_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_parts(
            std::env::var(SUPABASE_URL_ENV).ok(),
            std::env::var(SUPABASE_ANON_KEY_ENV).ok(),
            std::env::var(ACCESS_TOKEN_ENV).ok(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.snapshot_timeout, Duration::from_secs(30));
        assert_eq!(config.call_timeout, Duration::from_secs(15));
        assert_eq!(config.sync_interval, Duration::from_secs(60));
    }

    #[test]
    fn sync_config_builder_overrides() {
        let config = SyncConfig::default()
            .with_snapshot_timeout(Duration::from_millis(10))
            .with_call_timeout(Duration::from_millis(20))
            .with_sync_interval(Duration::from_secs(5));
        assert_eq!(config.snapshot_timeout, Duration::from_millis(10));
        assert_eq!(config.call_timeout, Duration::from_millis(20));
        assert_eq!(config.sync_interval, Duration::from_secs(5));
    }

    #[test]
    fn from_parts_none_when_unset() {
        assert!(RemoteConfig::from_parts(None, Some("  ".to_string()), None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn from_parts_requires_both_url_and_key() {
        assert!(matches!(
            RemoteConfig::from_parts(Some("https://demo.supabase.co".to_string()), None, None),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RemoteConfig::from_parts(None, Some("anon".to_string()), None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn from_parts_trims_values() {
        let config = RemoteConfig::from_parts(
            Some(" https://demo.supabase.co ".to_string()),
            Some(" anon ".to_string()),
            Some("   ".to_string()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(config.supabase_url, "https://demo.supabase.co");
        assert_eq!(config.anon_key, "anon");
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn from_parts_rejects_non_http_url() {
        assert!(matches!(
            RemoteConfig::from_parts(
                Some("ftp://demo".to_string()),
                Some("anon".to_string()),
                None
            ),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn debug_redacts_access_token() {
        let config = RemoteConfig::new("https://demo.supabase.co", "anon")
            .with_access_token("very-secret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
