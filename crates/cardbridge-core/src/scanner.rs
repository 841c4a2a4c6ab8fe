//! Scanner seam: the traits a hardware integration implements

use crate::error::ScanError;
use crate::types::{NfcStatus, StudentId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A card scanning device
#[async_trait]
pub trait CardScanner: Send + Sync {
    /// Current NFC adapter state, cheap to query.
    fn nfc_status(&self) -> NfcStatus;

    /// Open a reader session against the device.
    ///
    /// The bridge calls this lazily on the first scan and caches the
    /// returned handle for the life of the process.
    async fn open_reader(&self) -> Result<Arc<dyn CardReader>, ScanError>;
}

/// An open reader session
#[async_trait]
pub trait CardReader: Send + Sync {
    /// Wait for the next card. Resolves when a card is read, when the read
    /// fails, or when `stop` cancels it (`ScanError::Cancelled`).
    async fn read_card(&self) -> Result<StudentId, ScanError>;

    /// Stop listening. Wakes a pending `read_card` with `Cancelled`; a
    /// stopped reader stays usable for a later scan.
    async fn stop(&self);
}

impl fmt::Debug for dyn CardReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CardReader")
    }
}
