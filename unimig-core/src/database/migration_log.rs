//! Record of which (migration, organization) pairs have completed.
//!
//! The table is owned by the migration engine and created on first use. A row
//! existing is the signal the storage-mode resolver reads; nothing else about
//! the row matters.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Schema,
};
use tokio::sync::OnceCell;

use super::entities::migration_log;

#[async_trait]
pub trait MigrationLog: Send + Sync {
    async fn exists(&self, migration_id: &str, org_id: i64) -> Result<bool, DbErr>;

    /// Records completion. Recording an existing pair keeps a single row.
    async fn record(&self, migration_id: &str, org_id: i64) -> Result<(), DbErr>;
}

pub struct SqlMigrationLog {
    db: DatabaseConnection,
    table_ready: OnceCell<()>,
}

impl SqlMigrationLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            table_ready: OnceCell::new(),
        }
    }

    async fn ensure_table(&self) -> Result<(), DbErr> {
        self.table_ready
            .get_or_try_init(|| async {
                let backend = self.db.get_database_backend();
                let mut stmt = Schema::new(backend).create_table_from_entity(migration_log::Entity);
                stmt.if_not_exists();
                self.db.execute(backend.build(&stmt)).await?;
                tracing::debug!("migration log table ready");
                Ok::<(), DbErr>(())
            })
            .await
            .map(|_| ())
    }

    pub async fn count(&self, migration_id: &str, org_id: i64) -> Result<u64, DbErr> {
        self.ensure_table().await?;
        migration_log::Entity::find()
            .filter(migration_log::Column::MigrationId.eq(migration_id))
            .filter(migration_log::Column::OrgId.eq(org_id))
            .count(&self.db)
            .await
    }
}

#[async_trait]
impl MigrationLog for SqlMigrationLog {
    async fn exists(&self, migration_id: &str, org_id: i64) -> Result<bool, DbErr> {
        Ok(self.count(migration_id, org_id).await? > 0)
    }

    async fn record(&self, migration_id: &str, org_id: i64) -> Result<(), DbErr> {
        if self.exists(migration_id, org_id).await? {
            return Ok(());
        }

        migration_log::Entity::insert(migration_log::ActiveModel::completed(migration_id, org_id))
            .exec(&self.db)
            .await?;
        tracing::info!("recorded migration '{}' for org {}", migration_id, org_id);
        Ok(())
    }
}

/// Log kept in process memory. Rehearsals record here so that a dry run
/// never marks an organization as migrated in the legacy database.
#[derive(Default)]
pub struct MemoryMigrationLog {
    entries: Mutex<HashSet<(String, i64)>>,
}

impl MemoryMigrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MigrationLog for MemoryMigrationLog {
    async fn exists(&self, migration_id: &str, org_id: i64) -> Result<bool, DbErr> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries.contains(&(migration_id.to_string(), org_id)))
    }

    async fn record(&self, migration_id: &str, org_id: i64) -> Result<(), DbErr> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.insert((migration_id.to_string(), org_id)) {
            tracing::debug!("recorded migration '{}' for org {} in memory", migration_id, org_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let log = SqlMigrationLog::new(db);

        assert!(!log.exists("playlists migration", 1).await.unwrap());
        log.record("playlists migration", 1).await.unwrap();
        log.record("playlists migration", 1).await.unwrap();

        assert!(log.exists("playlists migration", 1).await.unwrap());
        assert!(!log.exists("playlists migration", 2).await.unwrap());
        assert_eq!(log.count("playlists migration", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_log_is_idempotent() {
        let log = MemoryMigrationLog::new();
        assert!(log.is_empty());

        log.record("short urls migration", 3).await.unwrap();
        log.record("short urls migration", 3).await.unwrap();

        assert_eq!(log.len(), 1);
        assert!(log.exists("short urls migration", 3).await.unwrap());
        assert!(!log.exists("short urls migration", 1).await.unwrap());
    }
}
