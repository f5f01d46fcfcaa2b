//! Engine-specific table locks held for the length of one migration run.
//!
//! - MySQL: `LOCK TABLES .. READ` on a dedicated connection that never goes
//!   back to the shared pool; released with `UNLOCK TABLES` and a close.
//! - Postgres: `LOCK TABLE .. IN SHARE MODE` inside a transaction; released by
//!   rolling the transaction back.
//! - SQLite: no-op, writes are already serialized.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, TransactionTrait,
};
use tracing::{debug, info, warn};

use crate::database::connection::dedicated_connection;
use crate::errors::{MigrationError, MigrationResult};

#[async_trait]
pub trait TableLocker: Send + Sync {
    /// Blocks writers on the given tables until the returned lock is released
    async fn lock_migration_tables(&self, tables: &[String]) -> MigrationResult<TableLock>;
}

#[async_trait]
pub trait Unlock: Send {
    async fn unlock(self: Box<Self>) -> MigrationResult<()>;
}

/// Held table locks. Call [`TableLock::release`]; a lock that is only dropped
/// is released when its connection or transaction goes away.
pub struct TableLock {
    tables: Vec<String>,
    inner: Option<Box<dyn Unlock>>,
}

impl TableLock {
    pub fn new(tables: Vec<String>, inner: Box<dyn Unlock>) -> Self {
        Self {
            tables,
            inner: Some(inner),
        }
    }

    pub fn noop(tables: Vec<String>) -> Self {
        Self {
            tables,
            inner: None,
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub async fn release(mut self) -> MigrationResult<()> {
        match self.inner.take() {
            Some(inner) => {
                inner.unlock().await?;
                debug!("released locks on [{}]", self.tables.join(", "));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        if self.inner.is_some() {
            warn!(
                "table locks on [{}] dropped without release",
                self.tables.join(", ")
            );
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Drops empty names and duplicates, keeping first-seen order, and rejects
/// anything that is not a plain identifier.
pub fn normalize_tables(tables: &[String]) -> MigrationResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tables.len());
    for table in tables {
        let table = table.trim();
        if table.is_empty() || normalized.iter().any(|seen| seen == table) {
            continue;
        }
        if !is_identifier(table) {
            return Err(MigrationError::InvalidTableName(table.to_string()));
        }
        normalized.push(table.to_string());
    }
    Ok(normalized)
}

pub struct MySqlTableLocker {
    database_url: String,
}

impl MySqlTableLocker {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

struct MySqlUnlock {
    connection: DatabaseConnection,
}

#[async_trait]
impl Unlock for MySqlUnlock {
    async fn unlock(self: Box<Self>) -> MigrationResult<()> {
        let unlocked = self
            .connection
            .execute_unprepared("UNLOCK TABLES")
            .await
            .map(|_| ());
        let closed = self.connection.close().await;
        unlocked.map_err(MigrationError::Unlock)?;
        closed.map_err(MigrationError::Unlock)
    }
}

/// Read locks on already normalized table names
pub fn mysql_lock_statement(tables: &[String]) -> String {
    let locks: Vec<String> = tables.iter().map(|table| format!("`{}` READ", table)).collect();
    format!("LOCK TABLES {}", locks.join(", "))
}

#[async_trait]
impl TableLocker for MySqlTableLocker {
    async fn lock_migration_tables(&self, tables: &[String]) -> MigrationResult<TableLock> {
        let tables = normalize_tables(tables)?;
        if tables.is_empty() {
            return Ok(TableLock::noop(tables));
        }

        let joined = tables.join(", ");
        let connection = dedicated_connection(&self.database_url)
            .await
            .map_err(|source| MigrationError::Lock {
                tables: joined.clone(),
                source,
            })?;

        let statement = mysql_lock_statement(&tables);
        if let Err(source) = connection.execute_unprepared(&statement).await {
            let _ = connection.close().await;
            return Err(MigrationError::Lock {
                tables: joined,
                source,
            });
        }

        info!("locked tables [{}] on dedicated connection", joined);
        Ok(TableLock::new(tables, Box::new(MySqlUnlock { connection })))
    }
}

pub struct PostgresTableLocker {
    db: DatabaseConnection,
}

impl PostgresTableLocker {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

struct PostgresUnlock {
    transaction: DatabaseTransaction,
}

#[async_trait]
impl Unlock for PostgresUnlock {
    async fn unlock(self: Box<Self>) -> MigrationResult<()> {
        self.transaction
            .rollback()
            .await
            .map_err(MigrationError::Unlock)
    }
}

/// Share lock on already normalized table names
pub fn postgres_lock_statement(tables: &[String]) -> String {
    let quoted: Vec<String> = tables.iter().map(|table| format!("\"{}\"", table)).collect();
    format!("LOCK TABLE {} IN SHARE MODE", quoted.join(", "))
}

#[async_trait]
impl TableLocker for PostgresTableLocker {
    async fn lock_migration_tables(&self, tables: &[String]) -> MigrationResult<TableLock> {
        let tables = normalize_tables(tables)?;
        if tables.is_empty() {
            return Ok(TableLock::noop(tables));
        }

        let joined = tables.join(", ");
        let lock_error = |source| MigrationError::Lock {
            tables: joined.clone(),
            source,
        };

        let transaction = self.db.begin().await.map_err(lock_error)?;
        let statement = postgres_lock_statement(&tables);
        // Dropping the transaction on error rolls it back
        transaction
            .execute_unprepared(&statement)
            .await
            .map_err(lock_error)?;

        info!("locked tables [{}] in share mode", joined);
        Ok(TableLock::new(tables, Box::new(PostgresUnlock { transaction })))
    }
}

pub struct SqliteTableLocker;

#[async_trait]
impl TableLocker for SqliteTableLocker {
    async fn lock_migration_tables(&self, tables: &[String]) -> MigrationResult<TableLock> {
        let tables = normalize_tables(tables)?;
        debug!("sqlite serializes writes, not locking [{}]", tables.join(", "));
        Ok(TableLock::noop(tables))
    }
}

/// Locker matching the connection's engine. MySQL needs the URL to open its
/// dedicated connection.
pub fn locker_for(db: &DatabaseConnection, database_url: &str) -> Arc<dyn TableLocker> {
    match db.get_database_backend() {
        DbBackend::MySql => Arc::new(MySqlTableLocker::new(database_url)),
        DbBackend::Postgres => Arc::new(PostgresTableLocker::new(db.clone())),
        DbBackend::Sqlite => Arc::new(SqliteTableLocker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_dedupes_and_drops_empty() {
        let tables = names(&["dashboard", "", "dashboard_version", "dashboard", "  "]);
        assert_eq!(
            normalize_tables(&tables).unwrap(),
            names(&["dashboard", "dashboard_version"])
        );
    }

    #[test]
    fn test_normalize_rejects_non_identifiers() {
        for bad in ["dashboard; DROP TABLE org", "1table", "a-b", "`x`"] {
            assert!(matches!(
                normalize_tables(&names(&[bad])),
                Err(MigrationError::InvalidTableName(_))
            ));
        }
    }

    #[test]
    fn test_mysql_lock_statement() {
        let tables = normalize_tables(&names(&["dashboard", "dashboard_version", "dashboard"])).unwrap();
        assert_eq!(
            mysql_lock_statement(&tables),
            "LOCK TABLES `dashboard` READ, `dashboard_version` READ"
        );
    }

    #[test]
    fn test_postgres_lock_statement() {
        let tables = normalize_tables(&names(&[" playlist ", "playlist_item", "playlist"])).unwrap();
        assert_eq!(
            postgres_lock_statement(&tables),
            "LOCK TABLE \"playlist\", \"playlist_item\" IN SHARE MODE"
        );
        assert_eq!(
            postgres_lock_statement(&names(&["short_url"])),
            "LOCK TABLE \"short_url\" IN SHARE MODE"
        );
    }

    #[tokio::test]
    async fn test_sqlite_lock_is_noop() {
        let lock = SqliteTableLocker
            .lock_migration_tables(&names(&["playlist", "playlist_item", "playlist"]))
            .await
            .unwrap();
        assert_eq!(lock.tables(), names(&["playlist", "playlist_item"]).as_slice());
        lock.release().await.unwrap();
    }
}
