//! Domain-specific error types for the migration engine
//!
//! # Error Categories
//!
//! - **MigrationError**: orchestration, locking, validation and configuration failures
//! - **LegacyError**: reading and decoding rows from the legacy relational schema
//! - **UnifiedError**: talking to the unified resource store
//!
//! Configuration errors are always raised before any table lock is taken or any
//! bulk stream is opened, so a failed run never leaves partial side effects.
//!
//! # Examples
//!
//! ```rust
//! use unimig::errors::{LegacyError, MigrationError};
//!
//! let err = MigrationError::InvalidNamespace("tenant-x".to_string());
//! assert!(err.is_configuration_error());
//!
//! let err = LegacyError::InvalidToken("org:1".to_string());
//! assert_eq!(err.error_code(), "INVALID_TOKEN");
//! ```

pub mod legacy;
pub mod migration;
pub mod unified;

pub use legacy::LegacyError;
pub use migration::MigrationError;
pub use unified::UnifiedError;

/// Result type alias for orchestration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Result type alias for legacy row reads
pub type LegacyResult<T> = Result<T, LegacyError>;

/// Result type alias for unified store calls
pub type UnifiedResult<T> = Result<T, UnifiedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_error_converts_into_migration_error() {
        let result: MigrationResult<()> = Err(LegacyError::InvalidToken("x".into()).into());
        assert!(matches!(result, Err(MigrationError::Legacy(_))));
    }

    #[test]
    fn test_unified_error_converts_into_migration_error() {
        let result: MigrationResult<()> = Err(UnifiedError::StreamClosed.into());
        assert!(matches!(result, Err(MigrationError::Unified(_))));
    }
}
