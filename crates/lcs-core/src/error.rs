//! Error types for LCS

use thiserror::Error;

/// Main error type for LCS
#[derive(Error, Debug)]
pub enum LcsError {
    /// A parameter is out of range. Fatal at setup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal fault, e.g. a match set that is still empty after covering.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// The environment broke the sense/act contract; the current cycle is aborted.
    #[error("Environment protocol error: {0}")]
    EnvironmentProtocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LcsError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::EnvironmentProtocol(msg.into())
    }
}

/// Result type alias for LCS operations
pub type Result<T> = std::result::Result<T, LcsError>;
