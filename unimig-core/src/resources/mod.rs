//! Resources this engine knows how to migrate, and the registry wiring them.

pub mod dashboards;
pub mod playlists;
pub mod short_urls;

use chrono::{DateTime, Utc};

use crate::registry::{GroupResource, MigrationRegistry};
use crate::unified::object::{
    ANNOTATION_CREATED_BY, ANNOTATION_INTERNAL_ID, ANNOTATION_UPDATED_BY,
    ANNOTATION_UPDATED_TIMESTAMP,
};
use crate::unified::ResourceObject;

pub const FOLDERS: GroupResource = GroupResource::from_static("folder.grafana.app", "folders");
pub const LIBRARY_PANELS: GroupResource =
    GroupResource::from_static("dashboard.grafana.app", "librarypanels");
pub const DASHBOARDS: GroupResource =
    GroupResource::from_static("dashboard.grafana.app", "dashboards");
pub const PLAYLISTS: GroupResource =
    GroupResource::from_static("playlist.grafana.app", "playlists");
pub const SHORT_URLS: GroupResource =
    GroupResource::from_static("shorturl.grafana.app", "shorturls");

/// Registry with every built-in definition, in dependency order
pub fn default_registry() -> MigrationRegistry {
    let registry = MigrationRegistry::new();
    registry.register(dashboards::definition());
    registry.register(playlists::definition());
    registry.register(short_urls::definition());
    registry
}

fn user_ref(user_id: i64) -> String {
    if user_id > 0 {
        format!("user:{}", user_id)
    } else {
        String::new()
    }
}

/// Annotations every migrated object carries about its legacy row
fn with_legacy_meta(
    object: ResourceObject,
    internal_id: i64,
    created_by: i64,
    updated_by: i64,
    updated: Option<DateTime<Utc>>,
) -> ResourceObject {
    object
        .annotate(ANNOTATION_INTERNAL_ID, internal_id.to_string())
        .annotate(ANNOTATION_CREATED_BY, user_ref(created_by))
        .annotate(ANNOTATION_UPDATED_BY, user_ref(updated_by))
        .annotate(
            ANNOTATION_UPDATED_TIMESTAMP,
            updated.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order_and_locks() {
        let registry = default_registry();
        let ids: Vec<String> = registry.all().iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["folders-dashboards", "playlists", "shorturls"]);

        let dashboards = registry.get("folders-dashboards").unwrap();
        assert_eq!(dashboards.group_resources(), vec![FOLDERS, LIBRARY_PANELS, DASHBOARDS]);
        assert_eq!(
            dashboards.lock_tables_for(&DASHBOARDS),
            ["dashboard", "dashboard_version", "dashboard_provisioning", "dashboard_tag"]
        );

        for resource in [FOLDERS, LIBRARY_PANELS, DASHBOARDS, PLAYLISTS, SHORT_URLS] {
            assert!(registry.has_resource(&resource), "{} missing", resource);
            assert!(registry.get_migrator(&resource).is_some());
        }
        assert_eq!(
            registry.definition_for(&SHORT_URLS).map(|d| d.migration_id.clone()),
            Some("short urls migration".to_string())
        );
    }
}
