//! Error types for CardBridge Core

use thiserror::Error;

/// Errors surfaced by a card scanner backend
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("NFC is not supported on this device")]
    NotSupported,

    #[error("NFC is disabled")]
    Disabled,

    #[error("scan stopped before a card was read")]
    Cancelled,

    #[error("failed to open card reader: {0}")]
    ReaderUnavailable(String),

    #[error("card read failed: {0}")]
    ReadFailed(String),
}

/// Errors surfaced by a transaction store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A transaction draft is missing name, token, or amount.
    #[error("Missing transaction details")]
    MissingDetails,

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
