use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::legacy_schema::LegacySchema;

pub struct TestDb {
    url: String,
}

impl TestDb {
    pub fn new_in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }

    pub fn new_file(path: impl AsRef<std::path::Path>) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path.as_ref().display()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        Database::connect(&self.url).await
    }

    /// Connects and creates the legacy tables.
    pub async fn connect_legacy(&self) -> Result<DatabaseConnection, DbErr> {
        let db = self.connect().await?;
        LegacySchema::up(&db, None).await?;
        Ok(db)
    }
}

/// In-memory SQLite database with the legacy schema applied.
pub async fn setup_legacy_db() -> DatabaseConnection {
    TestDb::new_in_memory()
        .connect_legacy()
        .await
        .expect("Failed to create legacy test database")
}
