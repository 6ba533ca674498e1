//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const PROFILE_ENV: &str = "NOTESYNC_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("notesync").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    notesync_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn is_http_url(value: &str) -> bool {
    notesync_core::util::is_http_url(value.trim())
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!(
                "Failed to read config at {}: {}",
                path.display(),
                error
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!(
                "Failed to parse config at {}: {}",
                path.display(),
                error
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CliError::Config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            CliError::Config(format!(
                "Failed to write config at {}: {}",
                path.display(),
                error
            ))
        })
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(PROFILE_ENV).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn supabase_url(&self) -> Option<String> {
        normalize_text_option(self.supabase_url.clone())
    }

    pub fn supabase_anon_key(&self) -> Option<String> {
        normalize_text_option(self.supabase_anon_key.clone())
    }

    pub fn user_id(&self) -> Option<String> {
        normalize_text_option(self.user_id.clone())
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.clone());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.clone());
        self.user_id = normalize_text_option(self.user_id.clone());
    }
}
