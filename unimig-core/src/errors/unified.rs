use thiserror::Error;

/// Failures talking to the unified resource store. Rejected items are not
/// errors; they come back inside the bulk response.
#[derive(Error, Debug)]
pub enum UnifiedError {
    #[error("Bulk stream closed before the response was received")]
    StreamClosed,

    #[error("Bulk stream rejected the request: {0}")]
    InvalidStream(String),

    #[error("Stats query failed: {0}")]
    Stats(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to encode resource: {0}")]
    Encode(#[from] serde_json::Error),
}

impl UnifiedError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, UnifiedError::StreamClosed | UnifiedError::Transport(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            UnifiedError::StreamClosed => "STREAM_CLOSED",
            UnifiedError::InvalidStream(_) => "INVALID_STREAM",
            UnifiedError::Stats(_) => "STATS_FAILED",
            UnifiedError::Transport(_) => "TRANSPORT_ERROR",
            UnifiedError::Encode(_) => "ENCODE_FAILED",
        }
    }
}
