use thiserror::Error;

use crate::DataPacket;

/// Core error type for the sqlmock step runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Failure reported by the backend while executing a step.
    ///
    /// The payload is whatever the backend (or a mock standing in for it)
    /// produced, passed through untouched.
    #[error("Backend error: {0}")]
    Backend(DataPacket),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// SQL file could not be loaded
    #[error("File load error: {0}")]
    FileLoad(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Step execution error
    #[error("Step execution error: {0}")]
    StepExecution(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Payload of a backend failure, if this is one
    pub fn backend_payload(&self) -> Option<&DataPacket> {
        match self {
            CoreError::Backend(payload) => Some(payload),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::FileLoad(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
