//! Protocol error types

use thiserror::Error;

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Message too large: {size} > {max}")]
    MessageTooLarge { size: usize, max: usize },
}

impl ProtocolError {
    /// Error code carried in the wire response for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::MissingArgument(_) | ProtocolError::InvalidArgument(_) => "INVALID_ARG",
            ProtocolError::InvalidCommand(_) | ProtocolError::MessageTooLarge { .. } => {
                "PARSE_ERROR"
            }
        }
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
