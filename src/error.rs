//! Error types for the race recommender

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the race recommender
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid weight table for mode {mode}: {reason}")]
    InvalidWeights { mode: String, reason: String },

    // Statistics provider errors
    #[error("Global stats fetch failed for series {series_id} at track {track_id}: {reason}")]
    GlobalStats {
        series_id: u32,
        track_id: u32,
        reason: String,
    },

    #[error("User history fetch failed for user {user_id}: {reason}")]
    UserHistory { user_id: u64, reason: String },

    #[error("Statistics provider unavailable: {0}")]
    ProviderUnavailable(String),

    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (a transient upstream provider failure)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::GlobalStats { .. } | Error::UserHistory { .. } | Error::ProviderUnavailable(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_are_retryable() {
        let err = Error::GlobalStats {
            series_id: 100,
            track_id: 50,
            reason: "timeout".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("series 100"));

        let err = Error::InvalidInput("negative race count".to_string());
        assert!(!err.is_retryable());
        assert!(!Error::Config("batch_width must be at least 1".to_string()).is_retryable());
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse: std::result::Result<u32, serde_json::Error> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
