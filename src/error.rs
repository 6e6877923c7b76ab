use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Strata engine
#[derive(Error, Debug)]
pub enum StrataError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Operation referenced a session id that does not exist
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    /// An anchor or refinement operation needed an embedding that is not stored
    #[error("No embedding stored for result: {id}")]
    MissingEmbedding { id: String },

    /// Both retrieval backends failed or timed out for one search call
    #[error("Search dependencies unavailable: {context}")]
    DependencyUnavailable { context: String },

    /// Malformed argument (empty centroid input, bad options, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Backing store errors
    #[error("Store error: {0}")]
    Store(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Strata operations
pub type Result<T> = std::result::Result<T, StrataError>;
