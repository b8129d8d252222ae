//! Error types for the RAN-RL core library

use thiserror::Error;

/// Core error type for RAN-RL operations
#[derive(Error, Debug)]
pub enum RlError {
    /// Invalid static configuration, detected at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-contract violation (never retried)
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Telemetry decode/encode errors at the source boundary
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RAN-RL operations
pub type Result<T> = std::result::Result<T, RlError>;
