use chrono::Utc;
use serde_json::json;
use unimig::errors::LegacyError;
use unimig::legacy::version;
use unimig::legacy::{ContinueToken, DashboardKind, LegacyRowSource, PageRequest};
use unimig::resources::{DASHBOARDS, FOLDERS, PLAYLISTS, SHORT_URLS};
use unimig_test_utils::fixtures::{
    insert_dashboard, insert_dashboard_raw, insert_dashboard_version, insert_short_url, seed_org,
    seed_standard_playlists, DashboardFixture,
};
use unimig_test_utils::setup_legacy_db;

async fn seed_dashboards(db: &sea_orm::DatabaseConnection, org_id: i64, count: usize) {
    for n in 0..count {
        let fixture = DashboardFixture::dashboard(&format!("dash-{}-{}", org_id, n), "Dash");
        insert_dashboard(db, org_id, &fixture).await.unwrap();
    }
}

#[tokio::test]
async fn test_pages_follow_tokens_in_id_order() {
    let db = setup_legacy_db().await;
    seed_org(&db, 1, "Main").await.unwrap();
    seed_org(&db, 2, "Other").await.unwrap();
    seed_dashboards(&db, 1, 5).await;
    seed_dashboards(&db, 2, 1).await;

    let source = LegacyRowSource::new(db.clone());
    let mut token = None;
    let mut page_sizes = Vec::new();
    let mut seen = Vec::new();
    loop {
        let request = PageRequest::new(1).with_limit(2).with_token(token.take());
        let page = source
            .dashboards_page(DashboardKind::Dashboard, &request)
            .await
            .unwrap();
        page_sizes.push(page.items.len());
        seen.extend(page.items.iter().map(|row| row.internal_id));
        match page.next {
            Some(next) => {
                assert_eq!(next.org_id, 1);
                assert_eq!(Some(&next.start_id), seen.last());
                token = Some(next);
            }
            None => break,
        }
    }

    assert_eq!(page_sizes, vec![2, 2, 1]);
    assert_eq!(seen.len(), 5);
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_exactly_full_page_has_no_token() {
    let db = setup_legacy_db().await;
    seed_dashboards(&db, 1, 3).await;

    let source = LegacyRowSource::new(db);
    let page = source
        .dashboards_page(DashboardKind::Dashboard, &PageRequest::new(1).with_limit(3))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);
    assert!(page.is_last());
}

#[tokio::test]
async fn test_byte_budget_returns_at_least_one_row() {
    let db = setup_legacy_db().await;
    seed_dashboards(&db, 1, 3).await;

    let source = LegacyRowSource::new(db);
    let request = PageRequest::new(1).with_limit(100).with_max_bytes(1);
    let page = source
        .dashboards_page(DashboardKind::Dashboard, &request)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.next.is_some());
}

#[tokio::test]
async fn test_folders_and_dashboards_are_separate() {
    let db = setup_legacy_db().await;
    insert_dashboard(&db, 1, &DashboardFixture::folder("f1", "Team"))
        .await
        .unwrap();
    insert_dashboard(&db, 1, &DashboardFixture::dashboard("d1", "In folder").in_folder("f1"))
        .await
        .unwrap();
    insert_dashboard(&db, 1, &DashboardFixture::dashboard("d2", "At root"))
        .await
        .unwrap();

    let source = LegacyRowSource::new(db);
    let folders = source
        .dashboards_page(DashboardKind::Folder, &PageRequest::new(1))
        .await
        .unwrap();
    assert_eq!(folders.items.len(), 1);
    assert!(folders.items[0].is_folder);

    let in_folder = source
        .dashboards_page(DashboardKind::Dashboard, &PageRequest::new(1).in_folder("f1"))
        .await
        .unwrap();
    let uids: Vec<_> = in_folder.items.iter().map(|row| row.uid.as_str()).collect();
    assert_eq!(uids, vec!["d1"]);

    assert_eq!(source.count(&FOLDERS, 1).await.unwrap(), 1);
    assert_eq!(source.count(&DASHBOARDS, 1).await.unwrap(), 2);
}

#[tokio::test]
async fn test_history_order_and_resource_versions() {
    let db = setup_legacy_db().await;
    let fixture = DashboardFixture::dashboard("hist", "History").with_version(3);
    let id = insert_dashboard(&db, 1, &fixture).await.unwrap();
    for saved in 1..=3 {
        insert_dashboard_version(&db, id, saved, &json!({ "title": format!("v{}", saved) }))
            .await
            .unwrap();
    }

    let source = LegacyRowSource::new(db);
    let newest_first = source
        .dashboards_page(DashboardKind::Dashboard, &PageRequest::history(1, "hist"))
        .await
        .unwrap();
    let versions: Vec<i64> = newest_first.items.iter().map(|row| row.version).collect();
    assert_eq!(versions, vec![3, 2, 1]);

    let oldest_first = source
        .dashboards_page(
            DashboardKind::Dashboard,
            &PageRequest::history(1, "hist").ascending().with_limit(2),
        )
        .await
        .unwrap();
    let versions: Vec<i64> = oldest_first.items.iter().map(|row| row.version).collect();
    assert_eq!(versions, vec![1, 2]);
    let next = oldest_first.next.expect("third version remains");

    let rest = source
        .dashboards_page(
            DashboardKind::Dashboard,
            &PageRequest::history(1, "hist")
                .ascending()
                .with_limit(2)
                .with_token(Some(next)),
        )
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].version, 3);
    assert_eq!(rest.items[0].data["title"], "v3");

    for row in newest_first.items.iter().chain(rest.items.iter()) {
        assert_eq!(version::decode(row.resource_version), row.version);
        assert_eq!(version::internal_id(row.resource_version), id);
    }
}

#[tokio::test]
async fn test_history_requires_uid() {
    let db = setup_legacy_db().await;
    let source = LegacyRowSource::new(db);

    let mut request = PageRequest::history(1, "x");
    request.uid = None;
    let err = source
        .dashboards_page(DashboardKind::Dashboard, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, LegacyError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_trash_only_returns_deleted_rows() {
    let db = setup_legacy_db().await;
    insert_dashboard(&db, 1, &DashboardFixture::dashboard("live", "Live"))
        .await
        .unwrap();
    insert_dashboard(&db, 1, &DashboardFixture::dashboard("gone", "Gone").deleted())
        .await
        .unwrap();

    let source = LegacyRowSource::new(db);
    let current = source
        .dashboards_page(DashboardKind::Dashboard, &PageRequest::new(1))
        .await
        .unwrap();
    assert_eq!(current.items.len(), 1);
    assert_eq!(current.items[0].uid, "live");

    let trash = source
        .dashboards_page(DashboardKind::Dashboard, &PageRequest::trash(1))
        .await
        .unwrap();
    assert_eq!(trash.items.len(), 1);
    assert_eq!(trash.items[0].uid, "gone");
    assert!(trash.items[0].deleted.is_some());

    assert_eq!(source.count(&DASHBOARDS, 1).await.unwrap(), 1);
}

#[tokio::test]
async fn test_undecodable_row_names_uid() {
    let db = setup_legacy_db().await;
    let fixture = DashboardFixture::dashboard("broken", "Broken");
    insert_dashboard_raw(&db, 1, &fixture, "{not json".to_string(), Utc::now().naive_utc())
        .await
        .unwrap();

    let source = LegacyRowSource::new(db);
    let err = source
        .dashboards_page(DashboardKind::Dashboard, &PageRequest::new(1))
        .await
        .unwrap_err();
    match err {
        LegacyError::Decode { uid, .. } => assert_eq!(uid, "broken"),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_from_other_org_is_rejected() {
    let db = setup_legacy_db().await;
    let source = LegacyRowSource::new(db);

    let request = PageRequest::new(1).with_token(Some(ContinueToken::new(2, 10, "")));
    let err = source
        .dashboards_page(DashboardKind::Dashboard, &request)
        .await
        .unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_playlists_and_short_urls() {
    let db = setup_legacy_db().await;
    seed_standard_playlists(&db, 1).await.unwrap();
    insert_short_url(&db, 1, "s1", "d/abc").await.unwrap();
    insert_short_url(&db, 2, "s2", "d/def").await.unwrap();

    let source = LegacyRowSource::new(db);
    let playlists = source.playlists_page(&PageRequest::new(1)).await.unwrap();
    assert_eq!(playlists.items.len(), 4);
    let item_counts: Vec<usize> = playlists.items.iter().map(|p| p.items.len()).collect();
    assert_eq!(item_counts, vec![2, 1, 2, 0]);

    let short_urls = source.short_urls_page(&PageRequest::new(1)).await.unwrap();
    assert_eq!(short_urls.items.len(), 1);
    assert_eq!(short_urls.items[0].path, "d/abc");

    assert_eq!(source.count(&PLAYLISTS, 1).await.unwrap(), 4);
    assert_eq!(source.count(&SHORT_URLS, 2).await.unwrap(), 1);
}

#[tokio::test]
async fn test_oversized_limits_are_clamped() {
    let db = setup_legacy_db().await;
    seed_standard_playlists(&db, 1).await.unwrap();
    seed_dashboards(&db, 1, 2).await;

    let source = LegacyRowSource::new(db).with_page_limits(u64::MAX, usize::MAX);
    let playlists = source
        .playlists_page(&PageRequest::new(1).with_limit(u64::MAX))
        .await
        .unwrap();
    assert_eq!(playlists.items.len(), 4);
    assert!(playlists.is_last());

    let dashboards = source
        .dashboards_page(DashboardKind::Dashboard, &PageRequest::new(1))
        .await
        .unwrap();
    assert_eq!(dashboards.items.len(), 2);
    assert!(dashboards.is_last());
}
