//! Errors raised while paging rows out of the legacy schema.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LegacyError {
    /// Continuation token is missing a segment, carries an unknown label or a
    /// non-numeric value
    #[error("Malformed continuation token: {0}")]
    InvalidToken(String),

    /// Token was issued for another organization
    #[error("Continuation token belongs to org {token_org}, query is for org {query_org}")]
    TokenOrgMismatch { token_org: i64, query_org: i64 },

    /// Row version or internal id does not fit the resource version encoding
    #[error("Cannot encode resource version for row {internal_id} at version {version}")]
    VersionOutOfRange { internal_id: i64, version: i64 },

    /// Stored payload did not decode
    #[error("Failed to decode {table} row '{uid}': {source}")]
    Decode {
        table: &'static str,
        uid: String,
        #[source]
        source: serde_json::Error,
    },

    /// Query shape and filters do not fit together
    #[error("Invalid legacy query: {0}")]
    InvalidQuery(String),

    /// Resource has no legacy query shape
    #[error("No legacy rows exist for resource {0}")]
    UnknownResource(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl LegacyError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LegacyError::InvalidToken(_)
                | LegacyError::TokenOrgMismatch { .. }
                | LegacyError::InvalidQuery(_)
                | LegacyError::UnknownResource(_)
        )
    }

    /// Bad data in a stored row rather than a bad request
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            LegacyError::Decode { .. } | LegacyError::VersionOutOfRange { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            LegacyError::InvalidToken(_) | LegacyError::TokenOrgMismatch { .. } => {
                "INVALID_TOKEN"
            }
            LegacyError::VersionOutOfRange { .. } => "VERSION_OUT_OF_RANGE",
            LegacyError::Decode { .. } => "DECODE_FAILED",
            LegacyError::InvalidQuery(_) => "INVALID_QUERY",
            LegacyError::UnknownResource(_) => "UNKNOWN_RESOURCE",
            LegacyError::Database(_) => "DATABASE_ERROR",
        }
    }
}
