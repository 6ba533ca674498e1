use clap::{CommandFactory, Parser};
use notesync_core::{NoteId, Replica, ReplicaStore, SyncOutcome};
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell, ResolveStrategy};
use crate::commands::common::{
    content_preview, format_conflict_lines, format_relative_time, format_replica_lines,
    format_timestamp, normalize_note_identifier, normalize_title, resolve_note, CliContext,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{merge_profile, missing_fields, validate_profile};
use crate::commands::list::list_replicas;
use crate::commands::resolve::build_decision;
use crate::commands::sync::format_sync_outcome;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

const USER: &str = "user-1";

fn replica_with_id(id: &str, title: &str) -> Replica {
    let mut replica = Replica::new_offline(USER, title, "body");
    replica.id = id.parse().unwrap();
    replica
}

fn test_context(dir: &tempfile::TempDir) -> CliContext {
    CliContext {
        db_path: dir.path().join("notesync.db"),
        profile: None,
        user: Some(USER.to_string()),
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn merge_resolution_requires_title_and_content() {
    let missing = Cli::try_parse_from(["notesync", "resolve", "abc", "merge"]);
    assert!(missing.is_err());

    let cli = Cli::try_parse_from([
        "notesync", "resolve", "abc", "merge", "--title", "T", "--content", "C",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Resolve {
            strategy: ResolveStrategy::Merge,
            ..
        }
    ));
}

#[test]
fn global_options_follow_subcommands() {
    let cli = Cli::try_parse_from(["notesync", "list", "--user", "someone", "--limit", "3"])
        .unwrap();
    assert_eq!(cli.user.as_deref(), Some("someone"));
    assert!(matches!(cli.command, Commands::List { limit: 3, .. }));
}

#[test]
fn build_decision_maps_strategies() {
    let id = NoteId::new();
    let local = build_decision(id, ResolveStrategy::Local, None, None).unwrap();
    assert_eq!(local, notesync_core::ConflictDecision::keep_local(id));

    let merged = build_decision(
        id,
        ResolveStrategy::Merge,
        Some("Title".to_string()),
        Some("Body".to_string()),
    )
    .unwrap();
    assert_eq!(
        merged,
        notesync_core::ConflictDecision::merge(id, "Title", "Body")
    );

    assert!(matches!(
        build_decision(id, ResolveStrategy::Merge, Some("Title".to_string()), None),
        Err(CliError::Config(_))
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn content_preview_truncates_with_ellipsis() {
    let preview = content_preview("This is a very long sentence that should be shortened", 20);
    assert_eq!(preview, "This is a very lo...");
    assert_eq!(content_preview("first\nsecond", 20), "first");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn replica_lines_mark_pending_changes() {
    let mut synced = replica_with_id("11111111-1111-4111-8111-111111111111", "Synced");
    synced.is_synced = true;
    let pending = replica_with_id("22222222-2222-4222-8222-222222222222", "Pending");

    let lines = format_replica_lines(&[synced, pending]);
    assert!(lines[0].starts_with("  11111111-1111"));
    assert!(lines[1].starts_with("* 22222222-2222"));
    assert!(lines[1].contains("Pending"));
}

#[test]
fn conflict_lines_include_both_timestamps() {
    let mut replica = replica_with_id("11111111-1111-4111-8111-111111111111", "Draft");
    replica.updated_at = 0;
    replica.conflict_version = Some(60_000);

    let lines = format_conflict_lines(&[replica]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("local=1970-01-01 00:00:00 UTC"));
    assert!(lines[0].contains("remote=1970-01-01 00:01:00 UTC"));
}

#[test]
fn sync_outcome_lists_conflicts_after_counts() {
    let outcome = SyncOutcome {
        conflicts: vec![replica_with_id(
            "11111111-1111-4111-8111-111111111111",
            "Draft",
        )],
        synced_count: 2,
        pulled_count: 1,
        refreshed_count: 0,
        purged_count: 1,
    };

    let lines = format_sync_outcome(&outcome);
    assert_eq!(
        lines[0],
        "Sync completed: 2 pushed, 1 pulled, 0 refreshed, 1 purged"
    );
    assert!(lines[1].starts_with("1 conflicts"));
    assert!(lines[2].contains("Draft"));

    let quiet = format_sync_outcome(&SyncOutcome::default());
    assert_eq!(quiet.len(), 1);
}

#[test]
fn normalize_note_identifier_rejects_empty() {
    assert!(matches!(
        normalize_note_identifier(" \n "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier("  abc123  ").unwrap(), "abc123");
    assert!(matches!(normalize_title("   "), Err(CliError::EmptyTitle)));
}

#[test]
fn merge_profile_prefers_explicit_values() {
    let existing = CliProfile {
        supabase_url: Some("https://old.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
        user_id: Some("user-old".to_string()),
    };

    let merged = merge_profile(
        &existing,
        Some("https://new.supabase.co/".to_string()),
        Some("  ".to_string()),
        None,
    );
    assert_eq!(
        merged,
        CliProfile {
            supabase_url: Some("https://new.supabase.co".to_string()),
            supabase_anon_key: Some("old-key".to_string()),
            user_id: Some("user-old".to_string()),
        }
    );
    assert!(missing_fields(&merged).is_empty());
    assert_eq!(
        missing_fields(&CliProfile::default()),
        vec!["supabase_url", "supabase_anon_key", "user_id"]
    );
}

#[test]
fn validate_profile_requires_http_scheme() {
    let profile = CliProfile {
        supabase_url: Some("project.supabase.co".to_string()),
        ..CliProfile::default()
    };
    assert!(matches!(
        validate_profile(&profile),
        Err(CliError::Config(_))
    ));
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("notesync"));
}

#[test]
fn explicit_user_wins() {
    let ctx = CliContext {
        user: Some("  explicit  ".to_string()),
        ..CliContext::default()
    };
    assert_eq!(ctx.user_id().unwrap(), "explicit");
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_note_supports_exact_and_prefix_id() {
    let store = ReplicaStore::open_in_memory().await.unwrap();
    let note_a = replica_with_id("11111111-1111-4111-8111-111111111111", "Note A");
    let note_b = replica_with_id("11111111-1111-4111-8111-222222222222", "Note B");
    let note_c = replica_with_id("33333333-3333-4333-8333-333333333333", "Note C");
    for replica in [&note_a, &note_b, &note_c] {
        store.upsert(replica).await.unwrap();
    }

    let exact = resolve_note(&note_a.id.to_string(), USER, &store)
        .await
        .unwrap();
    assert_eq!(exact.id, note_a.id);

    let by_prefix = resolve_note("3333", USER, &store).await.unwrap();
    assert_eq!(by_prefix.id, note_c.id);

    let longer = resolve_note("33333333-3333-4333", USER, &store).await.unwrap();
    assert_eq!(longer.id, note_c.id);

    assert!(matches!(
        resolve_note("11111111", USER, &store).await,
        Err(CliError::AmbiguousNoteId(_))
    ));
    assert!(matches!(
        resolve_note("ffff", USER, &store).await,
        Err(CliError::NoteNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_note_does_not_expand_wildcards() {
    let store = ReplicaStore::open_in_memory().await.unwrap();
    let only = replica_with_id("66666666-6666-4666-8666-666666666666", "Only note");
    store.upsert(&only).await.unwrap();

    for pattern in ["%", "_", "6666%"] {
        assert!(matches!(
            resolve_note(pattern, USER, &store).await,
            Err(CliError::NoteNotFound(_))
        ));
    }
    assert!(store.get_active(&only.id).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_note_ignores_other_owners_and_tombstones() {
    let store = ReplicaStore::open_in_memory().await.unwrap();
    let mut foreign = replica_with_id("44444444-4444-4444-8444-444444444444", "Theirs");
    foreign.user_id = "user-2".to_string();
    let deleted = replica_with_id("55555555-5555-4555-8555-555555555555", "Gone");
    store.upsert(&foreign).await.unwrap();
    store.upsert(&deleted).await.unwrap();
    store.tombstone(&deleted.id).await.unwrap();

    assert!(matches!(
        resolve_note(&foreign.id.to_string(), USER, &store).await,
        Err(CliError::NoteNotFound(_))
    ));
    assert!(matches!(
        resolve_note("5555", USER, &store).await,
        Err(CliError::NoteNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn list_replicas_respects_limit_and_owner() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir);
    {
        let store = ctx.open_store().await.unwrap();
        for (index, title) in ["First", "Second", "Third"].iter().enumerate() {
            let mut replica = Replica::new_offline(USER, *title, "");
            replica.updated_at = 1_000 + i64::try_from(index).unwrap();
            store.upsert(&replica).await.unwrap();
        }
        store
            .create_offline("user-2", "Not mine", "")
            .await
            .unwrap();
    }

    let recent = list_replicas(2, &ctx).await.unwrap();
    let titles = recent
        .iter()
        .map(|replica| replica.title.as_str())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["Third", "Second"]);
}
