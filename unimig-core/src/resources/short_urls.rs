use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tracing::debug;

use super::{with_legacy_meta, SHORT_URLS};
use crate::errors::MigrationResult;
use crate::legacy::{PageRequest, ShortUrlRow};
use crate::registry::{MigrationDefinition, ResourceInfo, ResourceMigrator};
use crate::services::count_validator::{CountQuery, CountValidator};
use crate::services::migration_run::{BulkSink, MigrationRun};
use crate::unified::{ApiVersion, BulkRequest, ResourceKey, ResourceObject, WriteAction};

pub const DEFINITION_ID: &str = "shorturls";
pub const MIGRATION_ID: &str = "short urls migration";

pub fn definition() -> MigrationDefinition {
    MigrationDefinition::new(DEFINITION_ID, MIGRATION_ID)
        .resource(
            ResourceInfo::new(SHORT_URLS, ["short_url"]),
            Arc::new(ShortUrlMigrator),
        )
        .validator(CountValidator::factory(
            "short urls count",
            vec![(SHORT_URLS, CountQuery::table("short_url"))],
        ))
}

fn short_url_object(namespace: &str, row: &ShortUrlRow) -> ResourceObject {
    let mut object = ResourceObject::new(
        SHORT_URLS.group(),
        ApiVersion::V0Alpha1,
        "ShortURL",
        namespace,
        &row.uid,
    )
    .with_spec(json!({ "path": row.path }))
    .with_resource_version(row.created_at);
    object.status = Some(json!({ "lastSeenAt": row.last_seen_at }));

    let created = Utc.timestamp_opt(row.created_at, 0).single();
    if let Some(created) = created {
        object = object.with_created(created);
    }
    with_legacy_meta(object, row.internal_id, row.created_by, 0, created)
}

pub struct ShortUrlMigrator;

#[async_trait]
impl ResourceMigrator for ShortUrlMigrator {
    async fn migrate(&self, run: &MigrationRun<'_>, sink: &mut BulkSink) -> MigrationResult<()> {
        let mut token = None;
        let mut count = 0;
        loop {
            run.check_cancelled()?;
            let request = PageRequest::new(run.org_id).with_token(token.take());
            let page = run.source.short_urls_page(&request).await?;

            for row in &page.items {
                let key = ResourceKey::new(run.namespace, &SHORT_URLS, &row.uid);
                let object = short_url_object(run.namespace, row);
                sink.send(BulkRequest::write(key, WriteAction::Added, &object)?)
                    .await?;
                count += 1;
            }
            run.report(count, "migrating short urls");

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("streamed {} short urls for org {}", count, run.org_id);
        Ok(())
    }
}
