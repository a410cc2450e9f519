//! Error types for a3s-bus

use thiserror::Error;

/// Errors that can occur around the dispatch bus
///
/// Subscribing and dispatching never fail. Errors only surface from
/// construction (opening a trace sink), configuration loading and `close()`.
#[derive(Debug, Error)]
pub enum BusError {
    /// I/O failure (trace file, config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Diagnostic trace sink failure
    #[error("Trace sink error: {0}")]
    Trace(String),
}

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;
