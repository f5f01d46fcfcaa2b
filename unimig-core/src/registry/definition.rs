use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::errors::{MigrationError, MigrationResult};
use crate::services::migration_run::{BulkSink, MigrationRun};
use crate::unified::{BulkResponse, StatsClient};

/// A kind of data in the unified store, identified by API group and plural
/// resource name. Used as the key everywhere a resource is looked up.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupResource {
    pub group: Cow<'static, str>,
    pub resource: Cow<'static, str>,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: Cow::Owned(group.into()),
            resource: Cow::Owned(resource.into()),
        }
    }

    pub const fn from_static(group: &'static str, resource: &'static str) -> Self {
        Self {
            group: Cow::Borrowed(group),
            resource: Cow::Borrowed(resource),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

/// Rendered as `resource.group`, the form used in configuration keys.
impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.group)
    }
}

impl FromStr for GroupResource {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((resource, group)) if !resource.is_empty() && !group.is_empty() => {
                Ok(GroupResource::new(group, resource))
            }
            _ => Err(MigrationError::Config(format!(
                "resource key '{}' must look like '<resource>.<group>'",
                s
            ))),
        }
    }
}

/// A resource plus the legacy tables whose writers must be blocked while it
/// is copied.
#[derive(Clone, Debug)]
pub struct ResourceInfo {
    pub group_resource: GroupResource,
    pub lock_tables: Vec<String>,
}

impl ResourceInfo {
    pub fn new<I, S>(group_resource: GroupResource, lock_tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_resource,
            lock_tables: lock_tables.into_iter().map(Into::into).collect(),
        }
    }
}

/// Streams one resource kind of one organization into an open bulk stream.
#[async_trait]
pub trait ResourceMigrator: Send + Sync {
    async fn migrate(&self, run: &MigrationRun<'_>, sink: &mut BulkSink) -> MigrationResult<()>;
}

/// Post-migration check over a closed bulk stream's response.
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(
        &self,
        legacy: &DatabaseConnection,
        response: &BulkResponse,
    ) -> MigrationResult<()>;
}

/// Builds a validator once the stats client for the run is known.
pub type ValidatorFactory = Arc<dyn Fn(Arc<dyn StatsClient>) -> Box<dyn Validator> + Send + Sync>;

/// Everything needed to migrate one group of resources for one organization.
pub struct MigrationDefinition {
    pub id: String,
    /// Key written to the migration log once an organization completes
    pub migration_id: String,
    /// Declared in dependency order: referenced resources come first
    pub resources: Vec<ResourceInfo>,
    pub migrators: HashMap<GroupResource, Arc<dyn ResourceMigrator>>,
    pub validators: Vec<ValidatorFactory>,
}

impl MigrationDefinition {
    pub fn new(id: impl Into<String>, migration_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            migration_id: migration_id.into(),
            resources: Vec::new(),
            migrators: HashMap::new(),
            validators: Vec::new(),
        }
    }

    pub fn resource(mut self, info: ResourceInfo, migrator: Arc<dyn ResourceMigrator>) -> Self {
        self.migrators.insert(info.group_resource.clone(), migrator);
        self.resources.push(info);
        self
    }

    pub fn validator(mut self, factory: ValidatorFactory) -> Self {
        self.validators.push(factory);
        self
    }

    pub fn group_resources(&self) -> Vec<GroupResource> {
        self.resources
            .iter()
            .map(|info| info.group_resource.clone())
            .collect()
    }

    pub fn covers(&self, group_resource: &GroupResource) -> bool {
        self.resources
            .iter()
            .any(|info| &info.group_resource == group_resource)
    }

    /// Position of the resource in declaration order
    pub fn position(&self, group_resource: &GroupResource) -> Option<usize> {
        self.resources
            .iter()
            .position(|info| &info.group_resource == group_resource)
    }

    pub fn lock_tables_for(&self, group_resource: &GroupResource) -> &[String] {
        self.resources
            .iter()
            .find(|info| &info.group_resource == group_resource)
            .map(|info| info.lock_tables.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDefinition")
            .field("id", &self.id)
            .field("migration_id", &self.migration_id)
            .field("resources", &self.resources)
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_resource_parse_and_display() {
        let gr: GroupResource = "playlists.playlist.grafana.app".parse().unwrap();
        assert_eq!(gr.group(), "playlist.grafana.app");
        assert_eq!(gr.resource(), "playlists");
        assert_eq!(gr.to_string(), "playlists.playlist.grafana.app");
    }

    #[test]
    fn test_static_and_owned_keys_are_equal() {
        const PLAYLISTS: GroupResource =
            GroupResource::from_static("playlist.grafana.app", "playlists");
        let owned = GroupResource::new("playlist.grafana.app", "playlists");
        assert_eq!(PLAYLISTS, owned);

        let mut map = HashMap::new();
        map.insert(PLAYLISTS, 1);
        assert_eq!(map.get(&owned), Some(&1));
    }

    #[test]
    fn test_group_resource_parse_rejects_missing_group() {
        assert!("playlists".parse::<GroupResource>().is_err());
        assert!(".grafana.app".parse::<GroupResource>().is_err());
    }
}
