//! Simulated scanner backend
//!
//! Stands in for NFC hardware in development and tests. A simulated reader
//! pops scripted outcomes first, then cycles through a configured card pool
//! after a tap delay; with neither configured it waits until stopped, like a
//! real reader waiting for a tap that never comes.

use async_trait::async_trait;
use cardbridge_core::{CardReader, CardScanner, NfcStatus, ScanError, StudentId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Configuration for the simulated scanner
#[derive(Debug, Clone)]
pub struct SimScannerConfig {
    /// Adapter state reported by status queries.
    pub status: NfcStatus,
    /// Card identifiers handed out in order, cycling.
    pub cards: Vec<String>,
    /// Simulated delay between a scan starting and a card appearing.
    pub tap_delay: Duration,
}

impl Default for SimScannerConfig {
    fn default() -> Self {
        Self {
            status: NfcStatus::Enabled,
            cards: Vec::new(),
            tap_delay: Duration::ZERO,
        }
    }
}

/// Simulated scanner
pub struct SimScanner {
    config: SimScannerConfig,
    script: Arc<Mutex<VecDeque<Result<StudentId, ScanError>>>>,
    readers_opened: AtomicUsize,
}

impl SimScanner {
    pub fn new(config: SimScannerConfig) -> Self {
        Self {
            config,
            script: Arc::new(Mutex::new(VecDeque::new())),
            readers_opened: AtomicUsize::new(0),
        }
    }

    /// Queue an outcome consumed before the card pool is consulted.
    pub fn push_outcome(&self, outcome: Result<StudentId, ScanError>) {
        self.script.lock().push_back(outcome);
    }

    /// How many reader sessions have been opened.
    pub fn readers_opened(&self) -> usize {
        self.readers_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardScanner for SimScanner {
    fn nfc_status(&self) -> NfcStatus {
        self.config.status
    }

    async fn open_reader(&self) -> Result<Arc<dyn CardReader>, ScanError> {
        match self.config.status {
            NfcStatus::NotSupported => return Err(ScanError::NotSupported),
            NfcStatus::Disabled => return Err(ScanError::Disabled),
            NfcStatus::Enabled => {}
        }

        let session = self.readers_opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(session, "Simulated reader opened");

        Ok(Arc::new(SimReader {
            script: self.script.clone(),
            cards: self.config.cards.clone(),
            tap_delay: self.config.tap_delay,
            next_card: AtomicUsize::new(0),
            stop_signal: Notify::new(),
        }))
    }
}

struct SimReader {
    script: Arc<Mutex<VecDeque<Result<StudentId, ScanError>>>>,
    cards: Vec<String>,
    tap_delay: Duration,
    next_card: AtomicUsize,
    stop_signal: Notify,
}

impl SimReader {
    fn next_card(&self) -> Option<String> {
        if self.cards.is_empty() {
            return None;
        }
        let idx = self.next_card.fetch_add(1, Ordering::SeqCst) % self.cards.len();
        Some(self.cards[idx].clone())
    }
}

#[async_trait]
impl CardReader for SimReader {
    async fn read_card(&self) -> Result<StudentId, ScanError> {
        let tap = async {
            if self.tap_delay > Duration::ZERO {
                tokio::time::sleep(self.tap_delay).await;
            }

            let scripted = self.script.lock().pop_front();
            if let Some(outcome) = scripted {
                return outcome;
            }

            match self.next_card() {
                Some(card) => Ok(StudentId::new(card)),
                // Nothing scripted and no pool: wait for a stop.
                None => std::future::pending::<Result<StudentId, ScanError>>().await,
            }
        };

        tokio::select! {
            _ = self.stop_signal.notified() => Err(ScanError::Cancelled),
            outcome = tap => outcome,
        }
    }

    async fn stop(&self) {
        // notify_waiters wakes only a pending read; a stop with no read in
        // flight must not affect the next scan.
        self.stop_signal.notify_waiters();
    }
}
