//! Database error categorization
//!
//! Lock acquisition, migration-log writes and legacy reads all surface
//! `sea_orm::DbErr`; the startup driver uses the category to report whether a
//! failed organization is worth re-running.
//!
//! ```
//! use unimig::common::db_errors::DbErrorKind;
//! use sea_orm::DbErr;
//!
//! let err = DbErr::RecordNotFound("org 7".to_string());
//! assert_eq!(DbErrorKind::from_db_err(&err), DbErrorKind::NotFound);
//! assert!(!DbErrorKind::NotFound.is_retryable());
//! ```

use sea_orm::DbErr;

/// Categories of database errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Query returned no results
    NotFound,

    /// Unique constraint violation
    UniqueViolation,

    /// Connection could not be established or acquired from the pool
    ConnectionError,

    /// Statement or acquire timeout
    Timeout,

    /// Transaction deadlock or lock wait timeout
    Deadlock,

    /// Table is missing, usually a fresh database
    MissingTable,

    Unknown,
}

impl DbErrorKind {
    pub fn from_db_err(err: &DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) => Self::NotFound,
            DbErr::Conn(inner) => {
                if inner.to_string().to_lowercase().contains("timeout") {
                    Self::Timeout
                } else {
                    Self::ConnectionError
                }
            }
            DbErr::Exec(inner) | DbErr::Query(inner) => Self::from_message(&inner.to_string()),
            _ => Self::Unknown,
        }
    }

    fn from_message(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("deadlock") || msg.contains("lock wait timeout") {
            Self::Deadlock
        } else if msg.contains("unique") || msg.contains("duplicate") {
            Self::UniqueViolation
        } else if msg.contains("no such table")
            || (msg.contains("relation") && msg.contains("does not exist"))
            || msg.contains("doesn't exist")
        {
            Self::MissingTable
        } else if msg.contains("timeout") || msg.contains("database is locked") {
            Self::Timeout
        } else {
            Self::Unknown
        }
    }

    /// Transient errors that might succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError | Self::Timeout | Self::Deadlock
        )
    }
}
