use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use unimig::config::UnifiedStorageConfig;
use unimig::resources::{playlists, PLAYLISTS};
use unimig::services::{MigrateOptions, OrgOutcome, StorageMode};
use unimig::unified::{MemoryResourceStore, ResourceKey};
use unimig::AppContext;
use unimig_test_utils::fixtures::{seed_org, seed_standard_playlists};
use unimig_test_utils::setup_legacy_db;

async fn setup() -> Result<(AppContext, Arc<MemoryResourceStore>)> {
    let db = setup_legacy_db().await;
    seed_org(&db, 1, "Main Org.").await?;
    seed_standard_playlists(&db, 1).await?;

    let store = Arc::new(MemoryResourceStore::spawn());
    let ctx = AppContext::new(
        db,
        "sqlite::memory:",
        UnifiedStorageConfig::default(),
        store.clone(),
    );
    Ok((ctx, store))
}

#[tokio::test]
async fn test_four_playlists_reach_the_unified_store() -> Result<()> {
    let (ctx, store) = setup().await?;
    let mut events = ctx.broadcaster().subscribe_with_capacity(16);

    let progress: Arc<Mutex<Vec<i64>>> = Arc::default();
    let seen = progress.clone();
    let options = MigrateOptions::new("default", vec![PLAYLISTS])
        .with_progress(Arc::new(move |count: i64, _message: &str| seen.lock().unwrap().push(count)));

    let response = ctx
        .migration_service()
        .migrate(options, &CancellationToken::new())
        .await?;

    assert_eq!(response.processed, 4);
    assert!(response.rejected.is_empty());
    assert_eq!(response.summary.len(), 1);
    assert_eq!(response.summary[0].count, 4);
    assert!(!response.summary[0].history);
    assert_eq!(progress.lock().unwrap().last(), Some(&4));

    let stored = store.list("default", &PLAYLISTS).await?;
    let names: Vec<&str> = stored.iter().map(|item| item.key.name.as_str()).collect();
    assert_eq!(names, vec!["pl-empty", "pl-mixed", "pl-tags", "pl-uids"]);

    let mixed = store
        .get(&ResourceKey::new("default", &PLAYLISTS, "pl-mixed"))
        .await?
        .expect("mixed playlist stored");
    let mixed = mixed.json()?;
    assert_eq!(mixed["kind"], "Playlist");
    assert_eq!(mixed["spec"]["title"], "Mixed");
    assert_eq!(mixed["spec"]["items"][0]["type"], "dashboard_by_uid");
    assert_eq!(mixed["spec"]["items"][1]["type"], "dashboard_by_tag");
    assert_eq!(mixed["spec"]["items"][1]["value"], "prod");

    let empty = store
        .get(&ResourceKey::new("default", &PLAYLISTS, "pl-empty"))
        .await?
        .expect("empty playlist stored");
    assert_eq!(empty.json()?["spec"]["items"], serde_json::json!([]));

    let mut streamed = 0;
    while events.try_recv().is_some() {
        streamed += 1;
    }
    assert_eq!(streamed, 4);

    assert!(
        ctx.migration_log()
            .exists(playlists::MIGRATION_ID, 1)
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_idempotent_at_the_log_level() -> Result<()> {
    let (ctx, store) = setup().await?;
    let resolver = ctx.storage_mode_service();
    assert_eq!(
        resolver.get_storage_mode(&PLAYLISTS, "default").await,
        StorageMode::Legacy
    );

    let cancel = CancellationToken::new();
    for _ in 0..2 {
        let options = MigrateOptions::new("default", vec![PLAYLISTS]);
        let response = ctx.migration_service().migrate(options, &cancel).await?;
        assert!(response.rejected.is_empty());
        assert_eq!(
            resolver.get_storage_mode(&PLAYLISTS, "default").await,
            StorageMode::Unified
        );
    }

    // rebuilt collections are replaced, not appended to
    assert_eq!(store.list("default", &PLAYLISTS).await?.len(), 4);
    assert_eq!(
        resolver.get_storage_mode(&PLAYLISTS, "org-2").await,
        StorageMode::Legacy
    );
    Ok(())
}

#[tokio::test]
async fn test_rehearsal_leaves_orgs_unmigrated() -> Result<()> {
    let db = setup_legacy_db().await;
    seed_org(&db, 1, "Main Org.").await?;
    seed_standard_playlists(&db, 1).await?;
    let cancel = CancellationToken::new();

    let rehearsal = AppContext::rehearsal(
        db.clone(),
        "sqlite::memory:",
        UnifiedStorageConfig::default(),
        Arc::new(MemoryResourceStore::spawn()),
    );
    let report = rehearsal.startup_service(false).run(&cancel).await?;
    assert!(matches!(
        report.outcome(playlists::DEFINITION_ID, 1),
        Some(OrgOutcome::Migrated { processed: 4, .. })
    ));

    let store = Arc::new(MemoryResourceStore::spawn());
    let ctx = AppContext::new(db, "sqlite::memory:", UnifiedStorageConfig::default(), store.clone());
    assert!(!ctx.migration_log().exists(playlists::MIGRATION_ID, 1).await?);
    assert_eq!(
        ctx.storage_mode_service().get_storage_mode(&PLAYLISTS, "default").await,
        StorageMode::Legacy
    );

    let report = ctx.startup_service(false).run(&cancel).await?;
    assert!(matches!(
        report.outcome(playlists::DEFINITION_ID, 1),
        Some(OrgOutcome::Migrated { processed: 4, .. })
    ));
    assert_eq!(store.list("default", &PLAYLISTS).await?.len(), 4);
    Ok(())
}
