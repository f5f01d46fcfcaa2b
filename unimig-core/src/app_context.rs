use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::UnifiedStorageConfig;
use crate::database::migration_log::{MemoryMigrationLog, MigrationLog, SqlMigrationLog};
use crate::legacy::{LegacyRowSource, WriteEventBroadcaster};
use crate::locker::locker_for;
use crate::registry::MigrationRegistry;
use crate::resources;
use crate::services::{MigrationService, StartupService, StorageModeService};
use crate::unified::{BulkStore, StatsClient};

/// Wires the registry, the legacy database and a unified store into the
/// migration services. Built once per process.
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    config: Arc<UnifiedStorageConfig>,
    registry: Arc<MigrationRegistry>,
    migration_log: Arc<dyn MigrationLog>,
    broadcaster: WriteEventBroadcaster,
    migration_service: Arc<MigrationService>,
    storage_mode_service: Arc<StorageModeService>,
}

impl AppContext {
    /// Uses the default registry of folders, dashboards, playlists and
    /// short URLs
    pub fn new<S>(
        db: DatabaseConnection,
        database_url: &str,
        config: UnifiedStorageConfig,
        store: Arc<S>,
    ) -> Self
    where
        S: BulkStore + StatsClient + 'static,
    {
        Self::with_registry(db, database_url, config, store, resources::default_registry())
    }

    /// Default registry with a log held in memory, for dry runs whose
    /// writes go to a throwaway store
    pub fn rehearsal<S>(
        db: DatabaseConnection,
        database_url: &str,
        config: UnifiedStorageConfig,
        store: Arc<S>,
    ) -> Self
    where
        S: BulkStore + StatsClient + 'static,
    {
        Self::with_migration_log(
            db,
            database_url,
            config,
            store,
            resources::default_registry(),
            Arc::new(MemoryMigrationLog::new()),
        )
    }

    pub fn with_registry<S>(
        db: DatabaseConnection,
        database_url: &str,
        config: UnifiedStorageConfig,
        store: Arc<S>,
        registry: MigrationRegistry,
    ) -> Self
    where
        S: BulkStore + StatsClient + 'static,
    {
        let migration_log = Arc::new(SqlMigrationLog::new(db.clone()));
        Self::with_migration_log(db, database_url, config, store, registry, migration_log)
    }

    pub fn with_migration_log<S>(
        db: DatabaseConnection,
        database_url: &str,
        config: UnifiedStorageConfig,
        store: Arc<S>,
        registry: MigrationRegistry,
        migration_log: Arc<dyn MigrationLog>,
    ) -> Self
    where
        S: BulkStore + StatsClient + 'static,
    {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let broadcaster = WriteEventBroadcaster::new();

        let source = LegacyRowSource::new(db.clone())
            .with_page_limits(config.page_size, config.max_page_bytes);
        let migration_service = Arc::new(
            MigrationService::new(
                registry.clone(),
                source,
                locker_for(&db, database_url),
                store.clone(),
                store,
                migration_log.clone(),
            )
            .with_broadcaster(broadcaster.clone()),
        );
        let storage_mode_service = Arc::new(StorageModeService::new(
            registry.clone(),
            migration_log.clone(),
            config.clone(),
        ));

        Self {
            db,
            config,
            registry,
            migration_log,
            broadcaster,
            migration_service,
            storage_mode_service,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn config(&self) -> Arc<UnifiedStorageConfig> {
        self.config.clone()
    }

    pub fn registry(&self) -> Arc<MigrationRegistry> {
        self.registry.clone()
    }

    pub fn migration_log(&self) -> Arc<dyn MigrationLog> {
        self.migration_log.clone()
    }

    pub fn broadcaster(&self) -> &WriteEventBroadcaster {
        &self.broadcaster
    }

    pub fn migration_service(&self) -> Arc<MigrationService> {
        self.migration_service.clone()
    }

    pub fn storage_mode_service(&self) -> Arc<StorageModeService> {
        self.storage_mode_service.clone()
    }

    pub fn startup_service(&self, with_history: bool) -> StartupService {
        StartupService::new(self.migration_service.clone(), self.config.clone())
            .with_history(with_history)
    }
}
