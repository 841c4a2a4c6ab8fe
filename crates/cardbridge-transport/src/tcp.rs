//! TCP transport for CardBridge

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use cardbridge_core::Bridge;
use cardbridge_protocol::Response;

use crate::handler::ConnectionHandler;

/// TCP Server for CardBridge
pub struct TcpServer {
    bridge: Arc<Bridge>,
    addr: SocketAddr,
    client_counter: AtomicU64,
}

impl TcpServer {
    pub fn new(bridge: Arc<Bridge>, addr: SocketAddr) -> Self {
        Self {
            bridge,
            addr,
            client_counter: AtomicU64::new(0),
        }
    }

    /// Start the TCP server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "CardBridge TCP server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let client_id = format!(
                        "tcp:{}:{}",
                        peer_addr,
                        self.client_counter.fetch_add(1, Ordering::Relaxed)
                    );
                    let bridge = self.bridge.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_connection(stream, client_id.clone(), bridge).await
                        {
                            error!(client = %client_id, error = %e, "Connection error");
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
        mut stream: TcpStream,
        client_id: String,
        bridge: Arc<Bridge>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(client = %client_id, "Client connected");

        let (mut handler, mut deferred_rx) = ConnectionHandler::new(client_id.clone(), bridge);
        let mut buf = vec![0u8; 4096];

        loop {
            tokio::select! {
                // Handle incoming data from client
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            info!(client = %client_id, "Client disconnected");
                            break;
                        }
                        Ok(n) => {
                            let responses = handler.process(&buf[..n]).await;
                            for response in responses {
                                let data = response.encode();
                                stream.write_all(&data).await?;

                                // Check for QUIT command
                                if matches!(response, Response::Ok(Some(ref msg)) if msg == "Goodbye") {
                                    return Ok(());
                                }
                            }
                        }
                        Err(e) => {
                            error!(client = %client_id, error = %e, "Read error");
                            break;
                        }
                    }
                }

                // Relay completed scan and history replies
                Some(response) = deferred_rx.recv() => {
                    let data = response.encode();
                    if let Err(e) = stream.write_all(&data).await {
                        error!(client = %client_id, error = %e, "Write error");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbridge_backend::{MemoryStore, SimScanner, SimScannerConfig};
    use cardbridge_core::Telemetry;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn test_bridge(cards: &[&str]) -> Arc<Bridge> {
        let scanner = SimScanner::new(SimScannerConfig {
            cards: cards.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        });
        Arc::new(Bridge::new(
            Arc::new(scanner),
            Arc::new(MemoryStore::new()),
            Telemetry::disabled(),
        ))
    }

    async fn spawn_server(bridge: Arc<Bridge>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bound_addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            TcpServer::handle_connection(stream, "test".into(), bridge)
                .await
                .unwrap();
        });

        (bound_addr, server)
    }

    #[tokio::test]
    async fn test_tcp_ping_pong() {
        let (addr, server) = spawn_server(test_bridge(&[])).await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"PING\r\n").await.unwrap();

        let mut reader = BufReader::new(&mut client);
        let mut response = String::new();
        reader.read_line(&mut response).await.unwrap();

        assert_eq!(response.trim(), "+PONG");

        client.write_all(b"QUIT\r\n").await.unwrap();
        drop(client);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_scan_and_save_round_trip() {
        let (addr, server) = spawn_server(test_bridge(&["stu-1001"])).await;

        let client = TcpStream::connect(addr).await.unwrap();
        let mut client = BufReader::new(client);
        let mut line = String::new();

        client.write_all(b"checkNfcStatus\r\n").await.unwrap();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), ":2");

        // The scan reply arrives through the deferred channel.
        client.write_all(b"startScan\r\n").await.unwrap();
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "$8");
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "stu-1001");

        client
            .write_all(b"saveTransaction NAME Lunch TOKEN stu-1001 AMOUNT 4.5 STATUS Completed\r\n")
            .await
            .unwrap();
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "#t");

        client.write_all(b"getHistory\r\n").await.unwrap();
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "*1");
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert!(line.starts_with('$'));
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert!(line.contains("\"token\":\"stu-1001\""));

        client.write_all(b"QUIT\r\n").await.unwrap();
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "+OK Goodbye");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_stop_cancels_pending_scan() {
        // No cards: the scan stays pending until stopScan cancels it.
        let (addr, server) = spawn_server(test_bridge(&[])).await;

        let client = TcpStream::connect(addr).await.unwrap();
        let mut client = BufReader::new(client);
        let mut line = String::new();

        client.write_all(b"startScan\r\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        client.write_all(b"stopScan\r\n").await.unwrap();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "+OK Stopped");

        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "-ERR SCAN_ERROR scan stopped before a card was read");

        client.write_all(b"QUIT\r\n").await.unwrap();
        line.clear();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "+OK Goodbye");

        server.await.unwrap();
    }
}
