//! Folders, library panels and dashboards. Declared in that order so a
//! dashboard never lands before the folder it references.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{with_legacy_meta, DASHBOARDS, FOLDERS, LIBRARY_PANELS};
use crate::errors::MigrationResult;
use crate::legacy::{DashboardKind, DashboardRow, LibraryPanelRow, PageRequest};
use crate::registry::{MigrationDefinition, ResourceInfo, ResourceMigrator};
use crate::services::count_validator::{CountQuery, CountValidator};
use crate::services::migration_run::{BulkSink, MigrationRun};
use crate::unified::object::ANNOTATION_MESSAGE;
use crate::unified::{ApiVersion, BulkRequest, ResourceKey, ResourceObject, WriteAction};

pub const DEFINITION_ID: &str = "folders-dashboards";
pub const MIGRATION_ID: &str = "folders and dashboards migration";

pub fn definition() -> MigrationDefinition {
    MigrationDefinition::new(DEFINITION_ID, MIGRATION_ID)
        .resource(
            ResourceInfo::new(FOLDERS, ["dashboard"]),
            Arc::new(FolderMigrator),
        )
        .resource(
            ResourceInfo::new(
                LIBRARY_PANELS,
                ["library_element", "library_element_connection"],
            ),
            Arc::new(LibraryPanelMigrator),
        )
        .resource(
            ResourceInfo::new(
                DASHBOARDS,
                [
                    "dashboard",
                    "dashboard_version",
                    "dashboard_provisioning",
                    "dashboard_tag",
                ],
            ),
            Arc::new(DashboardMigrator),
        )
        .validator(CountValidator::factory(
            "folders and dashboards count",
            vec![
                (
                    FOLDERS,
                    CountQuery::filtered("dashboard", "is_folder = TRUE AND deleted IS NULL"),
                ),
                (
                    DASHBOARDS,
                    CountQuery::filtered("dashboard", "is_folder = FALSE AND deleted IS NULL"),
                ),
                (LIBRARY_PANELS, CountQuery::filtered("library_element", "kind = 1")),
            ],
        ))
}

fn folder_object(namespace: &str, row: &DashboardRow) -> ResourceObject {
    let mut spec = json!({ "title": row.title });
    if let Some(description) = row.data.get("description").and_then(Value::as_str) {
        spec["description"] = Value::String(description.to_string());
    }

    let object = ResourceObject::new(FOLDERS.group(), ApiVersion::V1Beta1, "Folder", namespace, &row.uid)
        .with_spec(spec)
        .with_resource_version(row.resource_version)
        .with_generation(row.version)
        .with_created(row.created)
        .with_folder(row.folder_uid.as_deref());
    with_legacy_meta(object, row.internal_id, row.created_by, row.updated_by, Some(row.updated))
}

/// Dashboard body without the fields the object metadata already carries
fn dashboard_spec(data: &Value) -> Value {
    let mut spec = data.clone();
    if let Some(fields) = spec.as_object_mut() {
        for key in ["id", "uid", "version"] {
            fields.remove(key);
        }
    }
    spec
}

pub fn dashboard_object(namespace: &str, row: &DashboardRow) -> ResourceObject {
    let object = ResourceObject::new(
        DASHBOARDS.group(),
        ApiVersion::for_dashboard(&row.data),
        "Dashboard",
        namespace,
        &row.uid,
    )
    .with_spec(dashboard_spec(&row.data))
    .with_resource_version(row.resource_version)
    .with_generation(row.version)
    .with_created(row.created)
    .with_folder(row.folder_uid.as_deref())
    .annotate(ANNOTATION_MESSAGE, row.message.clone().unwrap_or_default());
    with_legacy_meta(object, row.internal_id, row.created_by, row.updated_by, Some(row.updated))
}

fn library_panel_object(namespace: &str, row: &LibraryPanelRow) -> ResourceObject {
    let object = ResourceObject::new(
        LIBRARY_PANELS.group(),
        ApiVersion::V0Alpha1,
        "LibraryPanel",
        namespace,
        &row.uid,
    )
    .with_spec(json!({
        "title": row.name,
        "type": row.panel_type,
        "description": row.description,
        "panel": row.model,
    }))
    .with_resource_version(row.resource_version)
    .with_generation(row.version)
    .with_created(row.created)
    .with_folder(row.folder_uid.as_deref());
    with_legacy_meta(object, row.internal_id, row.created_by, row.updated_by, Some(row.updated))
}

pub struct FolderMigrator;

#[async_trait]
impl ResourceMigrator for FolderMigrator {
    async fn migrate(&self, run: &MigrationRun<'_>, sink: &mut BulkSink) -> MigrationResult<()> {
        let mut token = None;
        let mut count = 0;
        loop {
            run.check_cancelled()?;
            let request = PageRequest::new(run.org_id).with_token(token.take());
            let page = run.source.dashboards_page(DashboardKind::Folder, &request).await?;

            for row in &page.items {
                let key = ResourceKey::new(run.namespace, &FOLDERS, &row.uid);
                sink.send(BulkRequest::write(key, WriteAction::Added, &folder_object(run.namespace, row))?)
                    .await?;
                count += 1;
            }
            run.report(count, "migrating folders");

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("streamed {} folders for org {}", count, run.org_id);
        Ok(())
    }
}

pub struct LibraryPanelMigrator;

#[async_trait]
impl ResourceMigrator for LibraryPanelMigrator {
    async fn migrate(&self, run: &MigrationRun<'_>, sink: &mut BulkSink) -> MigrationResult<()> {
        let mut token = None;
        let mut count = 0;
        loop {
            run.check_cancelled()?;
            let request = PageRequest::new(run.org_id).with_token(token.take());
            let page = run.source.library_panels_page(&request).await?;

            for row in &page.items {
                let key = ResourceKey::new(run.namespace, &LIBRARY_PANELS, &row.uid);
                let object = library_panel_object(run.namespace, row);
                sink.send(BulkRequest::write(key, WriteAction::Added, &object)?)
                    .await?;
                count += 1;
            }
            run.report(count, "migrating library panels");

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("streamed {} library panels for org {}", count, run.org_id);
        Ok(())
    }
}

pub struct DashboardMigrator;

impl DashboardMigrator {
    /// Saved versions older than the current row, oldest first, then the
    /// current row itself
    async fn send_with_history(
        &self,
        run: &MigrationRun<'_>,
        sink: &mut BulkSink,
        current: &DashboardRow,
    ) -> MigrationResult<()> {
        let key = ResourceKey::new(run.namespace, &DASHBOARDS, &current.uid);
        let mut action = WriteAction::Added;
        let mut token = None;

        loop {
            run.check_cancelled()?;
            let request = PageRequest::history(run.org_id, current.uid.as_str())
                .ascending()
                .with_token(token.take());
            let page = run.source.dashboards_page(DashboardKind::Dashboard, &request).await?;

            for row in page.items.iter().filter(|row| row.version < current.version) {
                let object = dashboard_object(run.namespace, row);
                sink.send(BulkRequest::write(key.clone(), action, &object)?)
                    .await?;
                action = WriteAction::Modified;
            }

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let object = dashboard_object(run.namespace, current);
        sink.send(BulkRequest::write(key, action, &object)?).await
    }

    async fn send_trash(&self, run: &MigrationRun<'_>, sink: &mut BulkSink) -> MigrationResult<i64> {
        let mut token = None;
        let mut count = 0;
        loop {
            run.check_cancelled()?;
            let request = PageRequest::trash(run.org_id).with_token(token.take());
            let page = run.source.dashboards_page(DashboardKind::Dashboard, &request).await?;

            for row in &page.items {
                let key = ResourceKey::new(run.namespace, &DASHBOARDS, &row.uid);
                let object = dashboard_object(run.namespace, row);
                sink.send(BulkRequest::write(key, WriteAction::Deleted, &object)?)
                    .await?;
                count += 1;
            }

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl ResourceMigrator for DashboardMigrator {
    async fn migrate(&self, run: &MigrationRun<'_>, sink: &mut BulkSink) -> MigrationResult<()> {
        let mut token = None;
        let mut count = 0;
        loop {
            run.check_cancelled()?;
            let request = PageRequest::new(run.org_id).with_token(token.take());
            let page = run.source.dashboards_page(DashboardKind::Dashboard, &request).await?;

            for row in &page.items {
                if run.with_history {
                    self.send_with_history(run, sink, row).await?;
                } else {
                    let key = ResourceKey::new(run.namespace, &DASHBOARDS, &row.uid);
                    let object = dashboard_object(run.namespace, row);
                    sink.send(BulkRequest::write(key, WriteAction::Added, &object)?)
                        .await?;
                }
                count += 1;
            }
            run.report(count, "migrating dashboards");

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        if run.with_history {
            let trashed = self.send_trash(run, sink).await?;
            debug!("streamed {} trashed dashboards for org {}", trashed, run.org_id);
        }
        debug!("streamed {} dashboards for org {}", count, run.org_id);
        Ok(())
    }
}
