//! Error types for the chart engine

use std::fmt;

/// Errors that can occur during analysis, chart generation, persistence or play
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Invalid input parameters
    InvalidInput(String),

    /// Audio decoding error
    DecodingError(String),

    /// Processing error during analysis
    ProcessingError(String),

    /// Persisted chart document is malformed
    ChartFormat(String),

    /// Operation not allowed in the current run state
    InvalidState(String),

    /// File system error at the persistence boundary
    Io(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            EngineError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            EngineError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            EngineError::ChartFormat(msg) => write!(f, "Chart format error: {}", msg),
            EngineError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            EngineError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::ChartFormat(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for EngineError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        EngineError::DecodingError(err.to_string())
    }
}
