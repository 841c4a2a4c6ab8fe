//! WebSocket transport for CardBridge

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info};

use cardbridge_core::Bridge;
use cardbridge_protocol::Response;

use crate::handler::ConnectionHandler;

/// WebSocket Server for CardBridge
pub struct WebSocketServer {
    bridge: Arc<Bridge>,
    addr: SocketAddr,
    client_counter: AtomicU64,
}

impl WebSocketServer {
    pub fn new(bridge: Arc<Bridge>, addr: SocketAddr) -> Self {
        Self {
            bridge,
            addr,
            client_counter: AtomicU64::new(0),
        }
    }

    /// Start the WebSocket server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "CardBridge WebSocket server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let client_id = format!(
                        "ws:{}:{}",
                        peer_addr,
                        self.client_counter.fetch_add(1, Ordering::Relaxed)
                    );
                    let bridge = self.bridge.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_connection(stream, client_id.clone(), bridge).await
                        {
                            error!(client = %client_id, error = %e, "WebSocket connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        client_id: String,
        bridge: Arc<Bridge>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = accept_async(stream).await?;
        let (mut write, mut read) = ws_stream.split();

        info!(client = %client_id, "WebSocket client connected");

        let (mut handler, mut deferred_rx) = ConnectionHandler::new(client_id.clone(), bridge);

        loop {
            tokio::select! {
                // Handle incoming WebSocket messages
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let mut data = text.into_bytes();
                            // Ensure line ending for parser
                            if !data.ends_with(b"\n") {
                                data.extend_from_slice(b"\r\n");
                            }

                            let responses = handler.process(&data).await;
                            for response in responses {
                                let encoded = response.encode();
                                let text = String::from_utf8_lossy(&encoded).to_string();
                                write.send(Message::Text(text.into())).await?;

                                // Check for QUIT
                                if matches!(response, Response::Ok(Some(ref msg)) if msg == "Goodbye") {
                                    return Ok(());
                                }
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let responses = handler.process(&data).await;
                            for response in responses {
                                let encoded = response.encode();
                                write.send(Message::Binary(encoded.to_vec().into())).await?;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(client = %client_id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(_)) => {
                            // Ignore other message types
                        }
                        Some(Err(e)) => {
                            error!(client = %client_id, error = %e, "WebSocket read error");
                            break;
                        }
                    }
                }

                // Relay completed scan and history replies
                Some(response) = deferred_rx.recv() => {
                    let encoded = response.encode();
                    let text = String::from_utf8_lossy(&encoded).to_string();
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        error!(client = %client_id, error = %e, "WebSocket write error");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}
