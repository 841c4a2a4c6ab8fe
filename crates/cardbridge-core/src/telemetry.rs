//! Fire-and-forget telemetry for CardBridge
//!
//! Bridge operations emit named events with string properties. Events flow
//! through an unbounded channel to a worker task that fans them out to the
//! configured sinks, so emission never blocks a caller and a slow sink never
//! delays a response.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

/// Event emitted when a scan delivers a card.
pub const EVENT_SCAN_SUCCESS: &str = "NFC Scan Success";
/// Event emitted when a scan resolves with a failure.
pub const EVENT_SCAN_ERROR: &str = "NFC Scan Error";
/// Event emitted when a transaction is persisted.
pub const EVENT_TRANSACTION_PROCESSED: &str = "Transaction Processed";
/// Event emitted by the panic hook.
pub const EVENT_CRASH: &str = "Crash";

/// A single telemetry event
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Attach a property, builder style.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Destination for recorded events
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &Event);
}

/// Emits one structured log line per event
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&self, event: &Event) {
        info!(event = %event.name, id = %event.id, properties = ?event.properties, "Telemetry event");
    }
}

/// Appends one JSON object per line to a file
pub struct JsonlSink {
    file: Mutex<std::fs::File>,
    path: PathBuf,
}

impl JsonlSink {
    /// Open (or create) the file at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: &Event) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize telemetry event");
                return;
            }
        };

        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line) {
            warn!(error = %e, path = %self.path.display(), "Failed to write telemetry event");
        }
    }
}

/// Captures events in memory; used by tests
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

enum Msg {
    Event(Event),
    Flush(oneshot::Sender<()>),
}

/// Cheap cloneable handle for emitting events
///
/// `track` never blocks and never fails; when the worker is gone or the
/// handle is disabled, events are dropped.
#[derive(Clone)]
pub struct Telemetry {
    sender: Option<mpsc::UnboundedSender<Msg>>,
}

impl Telemetry {
    /// Build a handle and the worker that drains it into `sinks`.
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> (Self, TelemetryWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();

        (
            Self {
                sender: Some(sender),
            },
            TelemetryWorker { receiver, sinks },
        )
    }

    /// A handle that drops every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Queue an event; fire-and-forget.
    pub fn track(&self, event: Event) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Msg::Event(event));
        }
    }

    /// Wait until every event queued before this call has reached the sinks.
    pub async fn flush(&self) {
        if let Some(sender) = &self.sender {
            let (tx, rx) = oneshot::channel();
            if sender.send(Msg::Flush(tx)).is_ok() {
                let _ = rx.await;
            }
        }
    }
}

/// Drains queued events to the configured sinks
pub struct TelemetryWorker {
    receiver: mpsc::UnboundedReceiver<Msg>,
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl TelemetryWorker {
    /// Run until every [`Telemetry`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                Msg::Event(event) => {
                    for sink in &self.sinks {
                        sink.record(&event);
                    }
                }
                Msg::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    }
}

/// Record a crash event for any panic, then delegate to the previous hook.
pub fn install_panic_hook(telemetry: Telemetry) {
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());

        telemetry.track(Event::new(EVENT_CRASH).with_property("Message", message));
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = Event::new(EVENT_SCAN_ERROR)
            .with_property("Error", "tag lost")
            .with_property("Retries", "0");

        assert_eq!(event.name, "NFC Scan Error");
        assert_eq!(event.properties.get("Error").unwrap(), "tag lost");
        assert_eq!(event.properties.len(), 2);
        assert!(!event.id.is_empty());
    }

    #[tokio::test]
    async fn test_events_reach_sinks_after_flush() {
        let sink = Arc::new(MemorySink::new());
        let (telemetry, worker) = Telemetry::new(vec![sink.clone()]);
        tokio::spawn(worker.run());

        telemetry.track(Event::new(EVENT_SCAN_SUCCESS));
        telemetry.track(Event::new(EVENT_TRANSACTION_PROCESSED).with_property("Amount", "4.5"));
        telemetry.flush().await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "NFC Scan Success");
        assert_eq!(events[1].properties.get("Amount").unwrap(), "4.5");
    }

    #[tokio::test]
    async fn test_disabled_handle_drops_events() {
        let telemetry = Telemetry::disabled();

        telemetry.track(Event::new(EVENT_SCAN_SUCCESS));
        // Must not hang without a worker.
        telemetry.flush().await;
    }

    #[tokio::test]
    async fn test_jsonl_sink_writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");

        let sink = Arc::new(JsonlSink::open(&path).unwrap());
        let (telemetry, worker) = Telemetry::new(vec![sink]);
        tokio::spawn(worker.run());

        telemetry.track(Event::new(EVENT_SCAN_SUCCESS));
        telemetry.track(Event::new(EVENT_SCAN_ERROR).with_property("Error", "boom"));
        telemetry.flush().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["name"], "NFC Scan Error");
        assert_eq!(second["properties"]["Error"], "boom");
    }
}
