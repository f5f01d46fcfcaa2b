use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbBackend, DbErr};
use std::time::Duration;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);

    // The startup driver holds at most a handful of connections: one for the
    // row source, one for the migration log and, on Postgres, the lock
    // transaction
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300)) // 5 minutes
        .max_lifetime(Duration::from_secs(3600)) // 1 hour
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    // Every pooled connection to an in-memory SQLite URL is its own database
    if database_url.contains(":memory:") {
        opt.max_connections(1);
    }

    Database::connect(opt).await
}

/// Opens a single-connection pool that is never shared with other callers.
/// Session-scoped statements such as `LOCK TABLES` must not run on pooled
/// connections.
pub async fn dedicated_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    Database::connect(opt).await
}

pub fn get_database_url(database_path: Option<&str>) -> String {
    match database_path {
        Some(path) if path == ":memory:" => "sqlite::memory:".to_string(),
        Some(path) if path.contains("://") || path.starts_with("sqlite:") => path.to_string(),
        Some(path) => format!("sqlite://{}?mode=rwc", path),
        None => "sqlite://grafana.db?mode=rwc".to_string(),
    }
}

/// Engine implied by the URL scheme
pub fn backend_for_url(database_url: &str) -> DbBackend {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        DbBackend::Postgres
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        DbBackend::MySql
    } else {
        DbBackend::Sqlite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_database_url() {
        assert_eq!(get_database_url(Some(":memory:")), "sqlite::memory:");
        assert_eq!(
            get_database_url(Some("data/grafana.db")),
            "sqlite://data/grafana.db?mode=rwc"
        );
        assert_eq!(
            get_database_url(Some("postgres://u:p@localhost/grafana")),
            "postgres://u:p@localhost/grafana"
        );
    }

    #[test]
    fn test_backend_for_url() {
        assert_eq!(backend_for_url("postgres://localhost/db"), DbBackend::Postgres);
        assert_eq!(backend_for_url("mysql://localhost/db"), DbBackend::MySql);
        assert_eq!(backend_for_url("sqlite::memory:"), DbBackend::Sqlite);
    }
}
