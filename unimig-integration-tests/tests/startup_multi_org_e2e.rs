use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use unimig::common::namespace::namespace_for_org;
use unimig::config::UnifiedStorageConfig;
use unimig::resources::{DASHBOARDS, FOLDERS, LIBRARY_PANELS, PLAYLISTS, SHORT_URLS};
use unimig::services::{OrgOutcome, StorageMode};
use unimig::unified::{MemoryResourceStore, ResourceKey};
use unimig::AppContext;
use unimig_test_utils::fixtures::{
    insert_dashboard, insert_dashboard_version, insert_library_panel, insert_short_url, seed_org,
    seed_standard_playlists, DashboardFixture,
};
use unimig_test_utils::setup_legacy_db;

const ORGS: [(i64, &str); 3] = [(1, "Main Org."), (2, "Ops"), (3, "Sales")];

#[tokio::test]
async fn test_startup_migrates_every_org_into_its_namespace() -> Result<()> {
    let db = setup_legacy_db().await;
    for (org_id, name) in ORGS {
        seed_org(&db, org_id, name).await?;
        seed_standard_playlists(&db, org_id).await?;

        let folder_uid = format!("folder-{}", org_id);
        insert_dashboard(&db, org_id, &DashboardFixture::folder(&folder_uid, "Team")).await?;
        let dashboard_id = insert_dashboard(
            &db,
            org_id,
            &DashboardFixture::dashboard(&format!("board-{}", org_id), "Board")
                .in_folder(&folder_uid)
                .with_version(2),
        )
        .await?;
        insert_dashboard_version(&db, dashboard_id, 1, &json!({ "title": "Board", "schemaVersion": 30 }))
            .await?;
        insert_dashboard_version(&db, dashboard_id, 2, &json!({ "title": "Board", "schemaVersion": 39 }))
            .await?;
        insert_library_panel(&db, org_id, &format!("panel-{}", org_id), "Latency", Some(&folder_uid))
            .await?;
        insert_short_url(&db, org_id, &format!("short-{}", org_id), "d/board").await?;
    }

    let store = Arc::new(MemoryResourceStore::spawn());
    let ctx = AppContext::new(
        db,
        "sqlite::memory:",
        UnifiedStorageConfig::default(),
        store.clone(),
    );
    let startup = Arc::new(ctx.startup_service(true));

    let report = startup.spawn(CancellationToken::new()).await??;
    assert!(!report.disabled);
    assert_eq!(report.entries.len(), 9);
    assert_eq!(report.failed().count(), 0);
    for entry in &report.entries {
        match &entry.outcome {
            OrgOutcome::Migrated { rejected, .. } => assert_eq!(*rejected, 0),
            other => panic!("{} for org {}: {:?}", entry.definition_id, entry.org_id, other),
        }
    }

    let resolver = ctx.storage_mode_service();
    for (org_id, _) in ORGS {
        let namespace = namespace_for_org(org_id);
        for gr in [FOLDERS, LIBRARY_PANELS, DASHBOARDS, PLAYLISTS, SHORT_URLS] {
            assert_eq!(store.list(&namespace, &gr).await?.len(), if gr == PLAYLISTS { 4 } else { 1 });
            assert_eq!(resolver.get_storage_mode(&gr, &namespace).await, StorageMode::Unified);
        }

        let board = store
            .get(&ResourceKey::new(&namespace, &DASHBOARDS, &format!("board-{}", org_id)))
            .await?
            .expect("dashboard stored");
        // history replay wrote version 1 then the current row
        assert_eq!(board.writes, 2);
        assert_eq!(board.folder, format!("folder-{}", org_id));
        assert_eq!(board.json()?["metadata"]["namespace"], namespace.as_str());
    }

    let rerun = ctx.startup_service(true).run(&CancellationToken::new()).await?;
    assert!(rerun
        .entries
        .iter()
        .all(|entry| entry.outcome == OrgOutcome::AlreadyMigrated));
    Ok(())
}
