//! Error types for Iris gateway

use thiserror::Error;

/// Result type alias for Iris operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Iris gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential lookup error
    #[error("credential error: {0}")]
    Credential(String),

    /// Secret store (file or cloud) error
    #[error("secret store error: {0}")]
    SecretStore(String),

    /// Vision API error
    #[error("vision error: {0}")]
    Vision(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Voice session error
    #[error("voice error: {0}")]
    Voice(String),

    /// Upload handling error
    #[error("upload error: {0}")]
    Upload(String),

    /// Hand-off queue error
    #[error("queue error: {0}")]
    Queue(String),

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
