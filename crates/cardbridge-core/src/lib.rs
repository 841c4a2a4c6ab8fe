//! CardBridge Core - card reader operations and telemetry
//!
//! This crate provides the core functionality for CardBridge:
//! - Backend seams for scanner hardware and transaction persistence
//! - The `Bridge`, the operations facade every transport dispatches into
//! - A fire-and-forget telemetry pipeline with pluggable sinks

pub mod bridge;
pub mod error;
pub mod scanner;
pub mod store;
pub mod telemetry;
pub mod types;

pub use bridge::Bridge;
pub use error::{BridgeError, ScanError, StoreError};
pub use scanner::{CardReader, CardScanner};
pub use store::TransactionStore;
pub use telemetry::{Event, Telemetry, TelemetrySink, TelemetryWorker};
pub use types::{NfcStatus, StudentId, Transaction, TransactionDraft};
