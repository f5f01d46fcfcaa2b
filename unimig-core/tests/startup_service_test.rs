use std::sync::Arc;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use unimig::config::{DualWriterMode, ResourceSettings, UnifiedStorageConfig};
use unimig::errors::MigrationError;
use unimig::resources::{dashboards, playlists, short_urls, DASHBOARDS, PLAYLISTS, SHORT_URLS};
use unimig::services::{FailurePolicy, OrgOutcome};
use unimig::unified::MemoryResourceStore;
use unimig::AppContext;
use unimig_test_utils::fixtures::{
    insert_dashboard, insert_dashboard_raw, insert_short_url, seed_org, seed_standard_playlists,
    DashboardFixture,
};
use unimig_test_utils::setup_legacy_db;

async fn two_orgs() -> DatabaseConnection {
    let db = setup_legacy_db().await;
    seed_org(&db, 1, "Main Org.").await.unwrap();
    seed_org(&db, 2, "Second").await.unwrap();
    seed_standard_playlists(&db, 1).await.unwrap();
    insert_dashboard(&db, 2, &DashboardFixture::dashboard("d2", "Second org board"))
        .await
        .unwrap();
    insert_short_url(&db, 2, "s1", "d/d2").await.unwrap();
    db
}

fn context(db: DatabaseConnection, config: UnifiedStorageConfig) -> AppContext {
    AppContext::new(db, "sqlite::memory:", config, Arc::new(MemoryResourceStore::spawn()))
}

fn settings(mode: u8) -> ResourceSettings {
    ResourceSettings {
        dual_writer_mode: DualWriterMode::new(mode).unwrap(),
        ..ResourceSettings::default()
    }
}

async fn plant_broken_dashboard(db: &DatabaseConnection, org_id: i64) {
    let fixture = DashboardFixture::dashboard("broken", "Broken");
    insert_dashboard_raw(db, org_id, &fixture, "{".to_string(), Utc::now().naive_utc())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_globally_disabled_runs_nothing() {
    let config = UnifiedStorageConfig {
        disable_migrations: true,
        ..UnifiedStorageConfig::default()
    };
    let ctx = context(two_orgs().await, config);

    let report = ctx
        .startup_service(false)
        .run(&CancellationToken::new())
        .await
        .unwrap();
    assert!(report.disabled);
    assert!(report.entries.is_empty());
    assert!(!ctx.migration_log().exists(playlists::MIGRATION_ID, 1).await.unwrap());
}

#[tokio::test]
async fn test_every_definition_for_every_org() {
    let ctx = context(two_orgs().await, UnifiedStorageConfig::default());
    let cancel = CancellationToken::new();

    let report = ctx.startup_service(false).run(&cancel).await.unwrap();
    assert_eq!(report.entries.len(), 6);
    assert_eq!(report.migrated(), 6);

    // registration order, orgs in id order within a definition
    let order: Vec<(&str, i64)> = report
        .entries
        .iter()
        .map(|entry| (entry.definition_id.as_str(), entry.org_id))
        .collect();
    assert_eq!(
        order,
        vec![
            (dashboards::DEFINITION_ID, 1),
            (dashboards::DEFINITION_ID, 2),
            (playlists::DEFINITION_ID, 1),
            (playlists::DEFINITION_ID, 2),
            (short_urls::DEFINITION_ID, 1),
            (short_urls::DEFINITION_ID, 2),
        ]
    );
    assert_eq!(
        report.outcome(playlists::DEFINITION_ID, 1),
        Some(&OrgOutcome::Migrated {
            processed: 4,
            rejected: 0
        })
    );
    assert_eq!(report.entries[1].org_name, "Second");

    let log = ctx.migration_log();
    for org_id in [1, 2] {
        assert!(log.exists(playlists::MIGRATION_ID, org_id).await.unwrap());
        assert!(log.exists(short_urls::MIGRATION_ID, org_id).await.unwrap());
    }

    let rerun = ctx.startup_service(false).run(&cancel).await.unwrap();
    assert!(rerun
        .entries
        .iter()
        .all(|entry| entry.outcome == OrgOutcome::AlreadyMigrated));
}

#[tokio::test]
async fn test_disabled_resource_skips_its_definition() {
    let config = UnifiedStorageConfig::default().with_resource(
        &SHORT_URLS,
        ResourceSettings {
            enable_migration: false,
            ..ResourceSettings::default()
        },
    );
    let ctx = context(two_orgs().await, config);

    let report = ctx
        .startup_service(false)
        .run(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.outcome(short_urls::DEFINITION_ID, 2),
        Some(&OrgOutcome::SkippedDisabled)
    );
    assert!(!ctx.migration_log().exists(short_urls::MIGRATION_ID, 2).await.unwrap());
    assert!(ctx.migration_log().exists(playlists::MIGRATION_ID, 2).await.unwrap());
}

#[tokio::test]
async fn test_threshold_skips_large_orgs() {
    let config = UnifiedStorageConfig::default().with_resource(
        &PLAYLISTS,
        ResourceSettings {
            auto_migration_threshold: 3,
            ..ResourceSettings::default()
        },
    );
    let ctx = context(two_orgs().await, config);

    let report = ctx
        .startup_service(false)
        .run(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.outcome(playlists::DEFINITION_ID, 1),
        Some(&OrgOutcome::SkippedThreshold {
            resource: PLAYLISTS,
            rows: 4,
            threshold: 3,
        })
    );
    assert!(matches!(
        report.outcome(playlists::DEFINITION_ID, 2),
        Some(OrgOutcome::Migrated { .. })
    ));
}

#[tokio::test]
async fn test_non_fatal_failure_moves_on() {
    let db = two_orgs().await;
    plant_broken_dashboard(&db, 1).await;
    let ctx = context(db, UnifiedStorageConfig::default());
    let startup = ctx.startup_service(false);

    let report = startup.run(&CancellationToken::new()).await.unwrap();
    match report.outcome(dashboards::DEFINITION_ID, 1) {
        Some(OrgOutcome::Failed { error, retryable }) => {
            assert!(error.contains("broken"));
            assert!(!retryable);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.migrated(), 5);
    assert_eq!(startup.failure_policy(), FailurePolicy::ProvenNonFatal);
    assert!(!ctx.migration_log().exists(dashboards::MIGRATION_ID, 1).await.unwrap());
}

#[tokio::test]
async fn test_failure_on_cut_over_resource_is_fatal() {
    let db = two_orgs().await;
    plant_broken_dashboard(&db, 1).await;
    let config = UnifiedStorageConfig::default().with_resource(&DASHBOARDS, settings(4));
    let ctx = context(db, config);
    let startup = Arc::new(ctx.startup_service(false));

    let err = startup
        .clone()
        .spawn(CancellationToken::new())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, MigrationError::Legacy(_)));
    assert_eq!(startup.failure_policy(), FailurePolicy::ProvenFatal);
    // the driver stopped before reaching org 2
    assert!(!ctx.migration_log().exists(dashboards::MIGRATION_ID, 2).await.unwrap());
}

#[tokio::test]
async fn test_operator_pin_overrides_cut_over() {
    let db = two_orgs().await;
    plant_broken_dashboard(&db, 1).await;
    let mut config = UnifiedStorageConfig::default().with_resource(&DASHBOARDS, settings(5));
    config.fatal_on_failure = Some(false);
    let ctx = context(db, config);

    let report = ctx
        .startup_service(false)
        .run(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.failed().count(), 1);
    assert!(ctx.migration_log().exists(dashboards::MIGRATION_ID, 2).await.unwrap());
}

#[tokio::test]
async fn test_cancelled_driver_stops() {
    let ctx = context(two_orgs().await, UnifiedStorageConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ctx.startup_service(false).run(&cancel).await.unwrap_err();
    assert!(matches!(err, MigrationError::Cancelled));
}
