//! Error types for the Principal decision engine

use thiserror::Error;

/// Result type alias for Principal core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Principal core operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The workflow config file does not exist
    #[error("Configuration file not found: {0}")]
    ConfigMissing(String),

    /// Configuration was present but malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A state counter could not be durably persisted
    #[error("State store error: {0}")]
    StateStore(String),

    /// A `tasks.md` file could not be read
    #[error("Failed to read tasks file {path}: {source}")]
    TasksFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The underlying platform client reported an error
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
