//! Orchestration error types
//!
//! ```rust
//! use unimig::errors::MigrationError;
//!
//! let err = MigrationError::CountMismatch {
//!     resource: "playlists.playlist.grafana.app".to_string(),
//!     namespace: "org-2".to_string(),
//!     legacy: 5,
//!     unified: 3,
//!     rejected: 1,
//! };
//! assert!(err.to_string().contains("org-2"));
//! assert_eq!(err.error_code(), "COUNT_MISMATCH");
//! ```

use sea_orm::DbErr;
use thiserror::Error;

use crate::common::db_errors::DbErrorKind;
use crate::errors::{LegacyError, UnifiedError};
use crate::registry::GroupResource;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// Namespace is neither `default` nor `org-<id>`
    #[error("Invalid namespace '{0}': expected 'default' or 'org-<id>'")]
    InvalidNamespace(String),

    #[error("Migration requires at least one resource")]
    NoResources,

    /// No migrator is registered for the resource
    #[error("Unsupported resource: {0}")]
    UnsupportedResource(GroupResource),

    /// Lock table names must be plain identifiers
    #[error("Invalid lock table name '{0}'")]
    InvalidTableName(String),

    #[error("Failed to lock tables [{tables}]: {source}")]
    Lock {
        tables: String,
        #[source]
        source: DbErr,
    },

    #[error("Failed to release table locks: {0}")]
    Unlock(#[source] DbErr),

    #[error(transparent)]
    Legacy(#[from] LegacyError),

    #[error(transparent)]
    Unified(#[from] UnifiedError),

    /// Legacy rows exceed what reached the unified store
    #[error(
        "Count mismatch for {resource} in {namespace}: legacy={legacy} unified={unified} rejected={rejected}"
    )]
    CountMismatch {
        resource: String,
        namespace: String,
        legacy: i64,
        unified: i64,
        rejected: i64,
    },

    #[error("Migration log error: {0}")]
    MigrationLog(#[source] DbErr),

    #[error("Migration definition '{0}' not found")]
    DefinitionNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Migration cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl MigrationError {
    /// Errors detected before any lock or stream is opened
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MigrationError::InvalidNamespace(_)
                | MigrationError::NoResources
                | MigrationError::UnsupportedResource(_)
                | MigrationError::InvalidTableName(_)
                | MigrationError::DefinitionNotFound(_)
                | MigrationError::Config(_)
        ) || matches!(self, MigrationError::Legacy(err) if err.is_client_error())
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, MigrationError::CountMismatch { .. })
    }

    /// Whether re-running the same organization may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            MigrationError::Lock { source, .. }
            | MigrationError::Unlock(source)
            | MigrationError::MigrationLog(source)
            | MigrationError::Database(source) => DbErrorKind::from_db_err(source).is_retryable(),
            MigrationError::Legacy(LegacyError::Database(source)) => {
                DbErrorKind::from_db_err(source).is_retryable()
            }
            MigrationError::Unified(err) => err.is_retryable(),
            MigrationError::Cancelled => true,
            _ => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            MigrationError::InvalidNamespace(_)
            | MigrationError::NoResources
            | MigrationError::InvalidTableName(_)
            | MigrationError::Config(_) => "INVALID_CONFIGURATION",
            MigrationError::UnsupportedResource(_) => "UNSUPPORTED_RESOURCE",
            MigrationError::DefinitionNotFound(_) => "NOT_FOUND",
            MigrationError::Lock { .. } | MigrationError::Unlock(_) => "LOCK_FAILED",
            MigrationError::Legacy(err) => err.error_code(),
            MigrationError::Unified(err) => err.error_code(),
            MigrationError::CountMismatch { .. } => "COUNT_MISMATCH",
            MigrationError::MigrationLog(_) => "MIGRATION_LOG_ERROR",
            MigrationError::Cancelled => "CANCELLED",
            MigrationError::Database(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_unsupported_resource_is_configuration_error() {
        let err = MigrationError::UnsupportedResource(GroupResource::new("x.app", "widgets"));
        assert_eq!(err.to_string(), "Unsupported resource: widgets.x.app");
        assert!(err.is_configuration_error());
        assert_eq!(err.error_code(), "UNSUPPORTED_RESOURCE");
    }

    #[test]
    fn test_malformed_token_is_configuration_error() {
        let err: MigrationError = LegacyError::InvalidToken("bad".into()).into();
        assert!(err.is_configuration_error());
        assert_eq!(err.error_code(), "INVALID_TOKEN");
    }

    #[test]
    fn test_lock_error_retryable_on_deadlock() {
        let err = MigrationError::Lock {
            tables: "dashboard".to_string(),
            source: DbErr::Exec(RuntimeErr::Internal(
                "Deadlock found when trying to get lock".into(),
            )),
        };
        assert!(err.is_retryable());
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_count_mismatch_is_not_retryable() {
        let err = MigrationError::CountMismatch {
            resource: "dashboards.dashboard.grafana.app".into(),
            namespace: "default".into(),
            legacy: 3,
            unified: 1,
            rejected: 1,
        };
        assert!(err.is_validation_error());
        assert!(!err.is_retryable());
    }
}
