use std::env;

use notesync_core::config::{SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};

use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            user_id,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            supabase_url,
            supabase_anon_key,
            user_id,
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    user_id: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load()?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(
        &existing_profile,
        supabase_url.or_else(|| env::var(SUPABASE_URL_ENV).ok()),
        supabase_anon_key.or_else(|| env::var(SUPABASE_ANON_KEY_ENV).ok()),
        user_id,
    );
    validate_profile(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save()?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let missing_fields = missing_fields(&merged);
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Set NOTESYNC_ACCESS_TOKEN and run `notesync sync`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load()?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    println!("profile            {profile_name}");
    println!("supabase_url       {}", display_option(profile.supabase_url()));
    println!(
        "supabase_anon_key  {}",
        display_option(profile.supabase_anon_key().map(|_| "[set]".to_string()))
    );
    println!("user_id            {}", display_option(profile.user_id()));
    Ok(())
}

/// Explicit values win over the stored profile; blanks never clear a field.
pub fn merge_profile(
    existing: &CliProfile,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    user_id: Option<String>,
) -> CliProfile {
    CliProfile {
        supabase_url: normalize_text_option(supabase_url)
            .map(|url| url.trim_end_matches('/').to_string())
            .or_else(|| existing.supabase_url()),
        supabase_anon_key: normalize_text_option(supabase_anon_key)
            .or_else(|| existing.supabase_anon_key()),
        user_id: normalize_text_option(user_id).or_else(|| existing.user_id()),
    }
}

pub fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn missing_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.supabase_url().is_none() {
        missing.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing.push("supabase_anon_key");
    }
    if profile.user_id().is_none() {
        missing.push("user_id");
    }
    missing
}

fn display_option(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}
