//! Error types for the Laxmi gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Laxmi gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an empty or missing input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Chat provider rejected the request with 429
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Chat provider rejected the request with 402
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Upstream provider answered with a non-success status
    #[error("upstream error {status}: {message}")]
    Upstream {
        /// HTTP status returned by the provider
        status: u16,
        /// Message safe to show to callers
        message: String,
    },

    /// Chat reply could not be interpreted
    #[error("chat error: {0}")]
    Chat(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

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
}

impl Error {
    /// Whether the provider asked us to back off and retry later
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Unavailable(_))
    }
}
