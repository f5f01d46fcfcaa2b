use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tracing::debug;

use super::{with_legacy_meta, PLAYLISTS};
use crate::errors::MigrationResult;
use crate::legacy::{PageRequest, PlaylistRow};
use crate::registry::{MigrationDefinition, ResourceInfo, ResourceMigrator};
use crate::services::count_validator::{CountQuery, CountValidator};
use crate::services::migration_run::{BulkSink, MigrationRun};
use crate::unified::{ApiVersion, BulkRequest, ResourceKey, ResourceObject, WriteAction};

pub const DEFINITION_ID: &str = "playlists";
pub const MIGRATION_ID: &str = "playlists migration";

pub fn definition() -> MigrationDefinition {
    MigrationDefinition::new(DEFINITION_ID, MIGRATION_ID)
        .resource(
            ResourceInfo::new(PLAYLISTS, ["playlist", "playlist_item"]),
            Arc::new(PlaylistMigrator),
        )
        .validator(CountValidator::factory(
            "playlists count",
            vec![(PLAYLISTS, CountQuery::table("playlist"))],
        ))
}

pub fn playlist_object(namespace: &str, row: &PlaylistRow) -> ResourceObject {
    let items: Vec<_> = row
        .items
        .iter()
        .map(|item| json!({ "type": item.item_type, "value": item.value }))
        .collect();

    let mut object = ResourceObject::new(
        PLAYLISTS.group(),
        ApiVersion::V0Alpha1,
        "Playlist",
        namespace,
        &row.uid,
    )
    .with_spec(json!({
        "title": row.name,
        "interval": row.interval,
        "items": items,
    }))
    .with_resource_version(row.updated_at);

    if let Some(created) = Utc.timestamp_millis_opt(row.created_at).single() {
        object = object.with_created(created);
    }
    let updated = Utc.timestamp_millis_opt(row.updated_at).single();
    with_legacy_meta(object, row.internal_id, 0, 0, updated)
}

pub struct PlaylistMigrator;

#[async_trait]
impl ResourceMigrator for PlaylistMigrator {
    async fn migrate(&self, run: &MigrationRun<'_>, sink: &mut BulkSink) -> MigrationResult<()> {
        let mut token = None;
        let mut count = 0;
        loop {
            run.check_cancelled()?;
            let request = PageRequest::new(run.org_id).with_token(token.take());
            let page = run.source.playlists_page(&request).await?;

            for row in &page.items {
                let key = ResourceKey::new(run.namespace, &PLAYLISTS, &row.uid);
                let object = playlist_object(run.namespace, row);
                sink.send(BulkRequest::write(key, WriteAction::Added, &object)?)
                    .await?;
                count += 1;
            }
            run.report(count, "migrating playlists");

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("streamed {} playlists for org {}", count, run.org_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::PlaylistItemRow;

    #[test]
    fn test_playlist_object_keeps_item_order() {
        let row = PlaylistRow {
            internal_id: 3,
            org_id: 2,
            uid: "pl-mixed".to_string(),
            name: "Mixed".to_string(),
            interval: "5m".to_string(),
            items: vec![
                PlaylistItemRow {
                    item_type: "dashboard_by_uid".to_string(),
                    value: "d1".to_string(),
                    title: String::new(),
                },
                PlaylistItemRow {
                    item_type: "dashboard_by_tag".to_string(),
                    value: "prod".to_string(),
                    title: String::new(),
                },
            ],
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_500_000,
        };

        let object = playlist_object("org-2", &row);
        assert_eq!(object.kind, "Playlist");
        assert_eq!(object.metadata.namespace, "org-2");
        assert_eq!(object.spec["items"][0]["type"], "dashboard_by_uid");
        assert_eq!(object.spec["items"][1]["value"], "prod");
        assert_eq!(object.metadata.resource_version, "1700000500000");
        assert!(object.metadata.creation_timestamp.is_some());
    }
}
