//! Connection handler - routes commands and relays results

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use cardbridge_core::{Bridge, BridgeError, TransactionDraft};
use cardbridge_protocol::{Command, Parser, Response};

/// Handles a single client connection.
///
/// Immediate commands are answered in the batch returned by
/// [`process`](ConnectionHandler::process). Deferred commands (`startScan`,
/// `getHistory`) are spawned as tasks; their single response arrives later
/// through the reply channel handed out by [`new`](ConnectionHandler::new),
/// so the connection stays responsive to `stopScan` while a scan waits for
/// a card.
pub struct ConnectionHandler {
    /// Unique client ID
    pub client_id: String,
    /// Shared bridge to the reader and the transaction store
    bridge: Arc<Bridge>,
    /// Protocol parser
    parser: Parser,
    /// Sender handed to deferred tasks
    deferred: mpsc::UnboundedSender<Response>,
}

impl ConnectionHandler {
    /// Creates a handler together with the receiving end of its
    /// deferred-reply channel. The transport owns the receiver and writes
    /// whatever arrives on it back to the client.
    pub fn new(
        client_id: String,
        bridge: Arc<Bridge>,
    ) -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (deferred, deferred_rx) = mpsc::unbounded_channel();
        (
            Self {
                client_id,
                bridge,
                parser: Parser::new(),
                deferred,
            },
            deferred_rx,
        )
    }

    /// Process incoming data and return the immediate responses
    pub async fn process(&mut self, data: &[u8]) -> Vec<Response> {
        let mut responses = Vec::new();

        // Feed data to parser
        if let Err(e) = self.parser.feed(data) {
            responses.push(Response::error(e.code(), e.to_string()));
            return responses;
        }

        // Parse and handle all complete commands
        loop {
            match self.parser.parse() {
                Ok(Some(cmd)) => {
                    if let Some(response) = self.handle_command(cmd).await {
                        responses.push(response);
                    }
                }
                Ok(None) => break, // Need more data
                Err(e) => {
                    responses.push(Response::error(e.code(), e.to_string()));
                    break;
                }
            }
        }

        responses
    }

    /// Handle a single command. `None` means the reply is deferred and will
    /// arrive through the reply channel instead.
    async fn handle_command(&mut self, cmd: Command) -> Option<Response> {
        debug!(client = %self.client_id, cmd = %cmd.name(), "Processing command");

        match cmd {
            Command::CheckNfcStatus => {
                Some(Response::integer(self.bridge.nfc_status().code()))
            }

            Command::StartScan => {
                self.spawn_scan();
                None
            }

            Command::StopScan => {
                self.bridge.stop_scan().await;
                Some(Response::ok_with_message("Stopped"))
            }

            Command::SaveTransaction { draft } => Some(self.handle_save(draft).await),

            Command::GetHistory => {
                self.spawn_history();
                None
            }

            Command::Ping => Some(Response::pong()),

            Command::Quit => Some(Response::ok_with_message("Goodbye")),

            Command::Unknown { name } => {
                debug!(client = %self.client_id, command = %name, "Command not implemented");
                Some(Response::not_implemented(name))
            }
        }
    }

    async fn handle_save(&self, draft: TransactionDraft) -> Response {
        match self.bridge.save_transaction(draft).await {
            Ok(_) => Response::boolean(true),
            Err(BridgeError::MissingDetails) => Response::missing_details(),
            Err(BridgeError::Store(e)) => Response::store_error(e.to_string()),
            Err(BridgeError::Scan(e)) => Response::scan_error(e.to_string()),
        }
    }

    /// Kick off a scan. The scan resolves whenever a card is tapped (or the
    /// reader fails, or a `stopScan` cancels it) and sends its one response
    /// through the deferred channel.
    fn spawn_scan(&self) {
        let bridge = self.bridge.clone();
        let deferred = self.deferred.clone();

        tokio::spawn(async move {
            let response = match bridge.start_scan().await {
                Ok(id) => Response::bulk(id.as_str()),
                Err(e) => Response::scan_error(e.to_string()),
            };
            // The receiver is gone when the client already disconnected.
            let _ = deferred.send(response);
        });
    }

    fn spawn_history(&self) {
        let bridge = self.bridge.clone();
        let deferred = self.deferred.clone();

        tokio::spawn(async move {
            let response = match bridge.history().await {
                Ok(records) => Response::history(&records),
                Err(e) => Response::store_error(e.to_string()),
            };
            let _ = deferred.send(response);
        });
    }
}
