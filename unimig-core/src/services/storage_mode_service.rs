use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::common::namespace::parse_namespace;
use crate::config::UnifiedStorageConfig;
use crate::database::migration_log::MigrationLog;
use crate::registry::{GroupResource, MigrationRegistry};

/// Where reads of a resource are served from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageMode {
    Legacy,
    DualWrite,
    Unified,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Legacy => write!(f, "legacy"),
            StorageMode::DualWrite => write!(f, "dual-write"),
            StorageMode::Unified => write!(f, "unified"),
        }
    }
}

/// Resolves the storage mode of a resource for one namespace.
///
/// Precedence: a dual-write pin in config, then a migration-log entry for the
/// owning definition, then a cut-over mode in config, then legacy. A failed
/// log lookup is logged and skipped; resolution never fails.
pub struct StorageModeService {
    registry: Arc<MigrationRegistry>,
    migration_log: Arc<dyn MigrationLog>,
    config: Arc<UnifiedStorageConfig>,
}

impl StorageModeService {
    pub fn new(
        registry: Arc<MigrationRegistry>,
        migration_log: Arc<dyn MigrationLog>,
        config: Arc<UnifiedStorageConfig>,
    ) -> Self {
        Self {
            registry,
            migration_log,
            config,
        }
    }

    pub async fn get_storage_mode(&self, group_resource: &GroupResource, namespace: &str) -> StorageMode {
        let settings = self.config.resource(group_resource);
        if settings.dual_writer_mode.is_dual_write() {
            debug!(
                "{} pinned to dual write ({})",
                group_resource, settings.dual_writer_mode
            );
            return StorageMode::DualWrite;
        }

        if self.is_migrated(group_resource, namespace).await {
            return StorageMode::Unified;
        }

        if settings.dual_writer_mode.is_cut_over() {
            return StorageMode::Unified;
        }

        StorageMode::Legacy
    }

    async fn is_migrated(&self, group_resource: &GroupResource, namespace: &str) -> bool {
        let Some(definition) = self.registry.definition_for(group_resource) else {
            return false;
        };

        let org_id = match parse_namespace(namespace) {
            Ok(org_id) => org_id,
            Err(err) => {
                warn!("cannot resolve storage mode of {} for {}: {}", group_resource, namespace, err);
                return false;
            }
        };

        match self.migration_log.exists(&definition.migration_id, org_id).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    "migration log lookup for {} in {} failed, falling back to config: {}",
                    group_resource, namespace, err
                );
                false
            }
        }
    }
}
