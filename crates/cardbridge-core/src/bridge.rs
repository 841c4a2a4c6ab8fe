//! Bridge operations: the dispatcher-facing facade over the backend seams

use crate::error::{BridgeError, ScanError, StoreError};
use crate::scanner::{CardReader, CardScanner};
use crate::store::TransactionStore;
use crate::telemetry::{self, Event, Telemetry};
use crate::types::{NfcStatus, StudentId, Transaction, TransactionDraft};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Central operations facade shared by every transport connection
///
/// Owns the lazily opened reader session and the telemetry handle. All
/// methods take `&self`; the bridge is shared as `Arc<Bridge>`.
pub struct Bridge {
    scanner: Arc<dyn CardScanner>,
    store: Arc<dyn TransactionStore>,
    telemetry: Telemetry,
    /// Opened on the first scan, reused for the life of the process.
    reader: Mutex<Option<Arc<dyn CardReader>>>,
}

impl Bridge {
    pub fn new(
        scanner: Arc<dyn CardScanner>,
        store: Arc<dyn TransactionStore>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            scanner,
            store,
            telemetry,
            reader: Mutex::new(None),
        }
    }

    /// Current NFC adapter state.
    pub fn nfc_status(&self) -> NfcStatus {
        self.scanner.nfc_status()
    }

    /// Wait for the next card on the cached reader, opening one on first use.
    ///
    /// A successful read stops the reader before the identifier is returned;
    /// the session stays cached for the next scan. A failed or cancelled
    /// read leaves the reader as-is.
    pub async fn start_scan(&self) -> Result<StudentId, ScanError> {
        let reader = self.reader_session().await?;

        match reader.read_card().await {
            Ok(id) => {
                info!(student_id = %id, "Card scanned");
                self.telemetry
                    .track(Event::new(telemetry::EVENT_SCAN_SUCCESS));
                reader.stop().await;
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "Scan failed");
                self.telemetry.track(
                    Event::new(telemetry::EVENT_SCAN_ERROR).with_property("Error", e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Stop any in-flight scan. Never fails; a missing reader is a no-op.
    pub async fn stop_scan(&self) {
        let reader = self.reader.lock().clone();
        if let Some(reader) = reader {
            reader.stop().await;
            debug!("Reader stopped");
        }
    }

    /// Validate and persist a transaction, then report it to telemetry.
    pub async fn save_transaction(
        &self,
        draft: TransactionDraft,
    ) -> Result<Transaction, BridgeError> {
        let tx = draft.build()?;
        self.store.save(&tx).await.map_err(BridgeError::Store)?;

        let mut event = Event::new(telemetry::EVENT_TRANSACTION_PROCESSED)
            .with_property("Amount", tx.amount.to_string());
        if let Some(status) = &tx.status {
            event = event.with_property("Status", status.clone());
        }
        self.telemetry.track(event);

        info!(name = %tx.name, amount = tx.amount, "Transaction saved");
        Ok(tx)
    }

    /// All stored transactions, most recent first.
    pub async fn history(&self) -> Result<Vec<Transaction>, StoreError> {
        self.store.history().await
    }

    /// Telemetry handle used by this bridge.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    async fn reader_session(&self) -> Result<Arc<dyn CardReader>, ScanError> {
        if let Some(reader) = self.reader.lock().clone() {
            return Ok(reader);
        }

        debug!("Opening card reader");
        let reader = self.scanner.open_reader().await?;

        // Concurrent first scans may both open; the first insert wins.
        Ok(self.reader.lock().get_or_insert_with(|| reader).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemorySink;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptReader {
        outcomes: Mutex<VecDeque<Result<StudentId, ScanError>>>,
        stops: AtomicUsize,
    }

    impl ScriptReader {
        fn new(outcomes: Vec<Result<StudentId, ScanError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                stops: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CardReader for ScriptReader {
        async fn read_card(&self) -> Result<StudentId, ScanError> {
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or(Err(ScanError::Cancelled))
        }

        async fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptScanner {
        reader: Arc<ScriptReader>,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl CardScanner for ScriptScanner {
        fn nfc_status(&self) -> NfcStatus {
            NfcStatus::Enabled
        }

        async fn open_reader(&self) -> Result<Arc<dyn CardReader>, ScanError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(self.reader.clone())
        }
    }

    #[derive(Default)]
    struct VecStore {
        items: Mutex<Vec<Transaction>>,
    }

    #[async_trait]
    impl TransactionStore for VecStore {
        async fn save(&self, tx: &Transaction) -> Result<(), StoreError> {
            self.items.lock().push(tx.clone());
            Ok(())
        }

        async fn history(&self) -> Result<Vec<Transaction>, StoreError> {
            let mut items = self.items.lock().clone();
            items.reverse();
            Ok(items)
        }
    }

    fn bridge_with(
        outcomes: Vec<Result<StudentId, ScanError>>,
    ) -> (Bridge, Arc<ScriptScanner>, Arc<MemorySink>) {
        let scanner = Arc::new(ScriptScanner {
            reader: ScriptReader::new(outcomes),
            opened: AtomicUsize::new(0),
        });
        let sink = Arc::new(MemorySink::new());
        let (telemetry, worker) = Telemetry::new(vec![sink.clone()]);
        tokio::spawn(worker.run());

        let bridge = Bridge::new(scanner.clone(), Arc::new(VecStore::default()), telemetry);
        (bridge, scanner, sink)
    }

    #[tokio::test]
    async fn test_scan_delivers_id_and_stops_reader() {
        let (bridge, scanner, sink) = bridge_with(vec![Ok(StudentId::new("stu-1001"))]);

        let id = bridge.start_scan().await.unwrap();
        assert_eq!(id.as_str(), "stu-1001");
        assert_eq!(scanner.reader.stops.load(Ordering::SeqCst), 1);

        bridge.telemetry().flush().await;
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "NFC Scan Success");
        assert!(events[0].properties.is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_scans_reuse_one_reader() {
        let (bridge, scanner, _sink) = bridge_with(vec![
            Ok(StudentId::new("stu-1")),
            Ok(StudentId::new("stu-2")),
        ]);

        bridge.start_scan().await.unwrap();
        let second = bridge.start_scan().await.unwrap();

        assert_eq!(second.as_str(), "stu-2");
        assert_eq!(scanner.opened.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.reader.stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scan_failure_is_tracked_and_reader_kept() {
        let (bridge, scanner, sink) =
            bridge_with(vec![Err(ScanError::ReadFailed("tag lost".into()))]);

        let err = bridge.start_scan().await.unwrap_err();
        assert!(matches!(err, ScanError::ReadFailed(_)));
        // Only a successful read stops the reader.
        assert_eq!(scanner.reader.stops.load(Ordering::SeqCst), 0);

        bridge.telemetry().flush().await;
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "NFC Scan Error");
        assert_eq!(
            events[0].properties.get("Error").unwrap(),
            "card read failed: tag lost"
        );
    }

    #[tokio::test]
    async fn test_stop_scan_without_reader_is_noop() {
        let (bridge, scanner, _sink) = bridge_with(vec![]);

        bridge.stop_scan().await;
        assert_eq!(scanner.opened.load(Ordering::SeqCst), 0);
        assert_eq!(scanner.reader.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_rejects_incomplete_draft() {
        let (bridge, _scanner, sink) = bridge_with(vec![]);

        let draft = TransactionDraft {
            name: Some("Lunch".into()),
            amount: Some(4.5),
            ..Default::default()
        };
        let err = bridge.save_transaction(draft).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing transaction details");

        bridge.telemetry().flush().await;
        assert!(sink.events().is_empty());
        assert!(bridge.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_persists_and_tracks() {
        let (bridge, _scanner, sink) = bridge_with(vec![]);

        let draft = TransactionDraft {
            name: Some("Lunch".into()),
            token: Some("tok-9".into()),
            amount: Some(12.0),
            status: Some("Completed".into()),
        };
        bridge.save_transaction(draft).await.unwrap();

        let draft = TransactionDraft {
            name: Some("Bus".into()),
            token: Some("tok-10".into()),
            amount: Some(2.5),
            status: None,
        };
        bridge.save_transaction(draft).await.unwrap();

        let history = bridge.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].name, "Bus");
        assert_eq!(history[1].name, "Lunch");

        bridge.telemetry().flush().await;
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "Transaction Processed");
        assert_eq!(events[0].properties.get("Amount").unwrap(), "12");
        assert_eq!(events[0].properties.get("Status").unwrap(), "Completed");
        // Status property is omitted when the transaction carries none.
        assert!(!events[1].properties.contains_key("Status"));
    }
}
