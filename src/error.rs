//! Error types for the R3 assistant

use thiserror::Error;

/// Result type alias for R3 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the R3 assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Capture or synthesis is not available on this host
    #[error("speech unsupported: {0}")]
    SpeechUnsupported(String),

    /// Capture engine reported an error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Completion provider could not be reached
    #[error("completion provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// Completion provider answered with a non-success status
    #[error("completion provider error {status}: {body}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// Utterance was empty after normalization
    #[error("empty input")]
    EmptyInput,

    /// Knowledge table could not be loaded
    #[error("knowledge error: {0}")]
    Knowledge(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this error came from the completion provider
    #[must_use]
    pub const fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnreachable(_) | Self::Provider { .. } | Self::Http(_)
        )
    }
}
