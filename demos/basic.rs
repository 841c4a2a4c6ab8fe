//! Basic CardBridge Example
//!
//! This example demonstrates card reader operations using the embedded API.
//!
//! Run with: cargo run --example basic

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use cardbridge_backend::{MemoryStore, SimScanner, SimScannerConfig};
use cardbridge_core::telemetry::LogSink;
use cardbridge_core::{Bridge, Telemetry, TelemetrySink, TransactionDraft};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("CardBridge Basic Example\n");

    // Example 1: Direct API usage (embedded mode)
    println!("=== Embedded Mode ===\n");
    embedded_example().await?;

    // Example 2: TCP client usage
    println!("\n=== TCP Client Mode ===");
    println!("(Start cardbridged first with: cargo run --bin cardbridged -- --cards stu-1001)\n");

    // Uncomment to test with running server:
    // tcp_client_example().await?;

    Ok(())
}

async fn embedded_example() -> Result<(), Box<dyn std::error::Error>> {
    // Simulated scanner: two cards, short tap delay
    let scanner = Arc::new(SimScanner::new(SimScannerConfig {
        cards: vec!["stu-1001".to_string(), "stu-1002".to_string()],
        tap_delay: Duration::from_millis(100),
        ..Default::default()
    }));

    let sinks: Vec<Arc<dyn TelemetrySink>> = vec![Arc::new(LogSink)];
    let (telemetry, worker) = Telemetry::new(sinks);
    tokio::spawn(worker.run());

    let bridge = Bridge::new(scanner, Arc::new(MemoryStore::new()), telemetry.clone());

    // Check the adapter
    println!("NFC status: {}", bridge.nfc_status().code());

    // Scan two cards; the reader is opened once and reused
    let id = bridge.start_scan().await?;
    println!("First card: {}", id);

    let id = bridge.start_scan().await?;
    println!("Second card: {}", id);

    // Record a transaction for the last scanned card
    let draft = TransactionDraft {
        name: Some("Lunch".to_string()),
        token: Some(id.to_string()),
        amount: Some(4.5),
        status: Some("Completed".to_string()),
    };
    let tx = bridge.save_transaction(draft).await?;
    println!("\nSaved: {} / {} / {:.2}", tx.name, tx.token, tx.amount);

    // Read everything back, newest first
    println!("\nHistory:");
    for tx in bridge.history().await? {
        println!("  - {} {} {:.2} {:?}", tx.name, tx.token, tx.amount, tx.status);
    }

    // Make sure the telemetry events hit the sinks before we exit
    telemetry.flush().await;

    Ok(())
}

async fn tcp_client_example() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = "127.0.0.1:7226".parse()?;
    let mut stream = TcpStream::connect(addr).await?;
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    // Helper to send command and read response
    async fn send_cmd(
        writer: &mut tokio::net::tcp::WriteHalf<'_>,
        reader: &mut BufReader<tokio::net::tcp::ReadHalf<'_>>,
        cmd: &str,
    ) -> Result<String, Box<dyn std::error::Error>> {
        println!("> {}", cmd);
        writer.write_all(format!("{}\r\n", cmd).as_bytes()).await?;

        let mut response = String::new();
        reader.read_line(&mut response).await?;
        println!("< {}", response.trim());
        Ok(response)
    }

    // PING
    send_cmd(&mut writer, &mut reader, "PING").await?;

    // Adapter status
    send_cmd(&mut writer, &mut reader, "checkNfcStatus").await?;

    // Scan a card; the reply is a bulk string, so read the data line too
    let header = send_cmd(&mut writer, &mut reader, "startScan").await?;
    if header.starts_with('$') {
        let mut id = String::new();
        reader.read_line(&mut id).await?;
        println!("< {}", id.trim());
    }

    // Save a transaction and list the history
    send_cmd(
        &mut writer,
        &mut reader,
        "saveTransaction NAME Lunch TOKEN stu-1001 AMOUNT 4.5 STATUS Completed",
    )
    .await?;

    // History replies with *<count>, then one bulk JSON object per record
    let header = send_cmd(&mut writer, &mut reader, "getHistory").await?;
    if let Some(count) = header.trim().strip_prefix('*').and_then(|n| n.parse::<usize>().ok()) {
        for _ in 0..count {
            let mut len_line = String::new();
            reader.read_line(&mut len_line).await?;
            let mut record = String::new();
            reader.read_line(&mut record).await?;
            println!("< {}", record.trim());
        }
    }

    // Stopping with nothing in flight still succeeds
    send_cmd(&mut writer, &mut reader, "stopScan").await?;

    // QUIT
    send_cmd(&mut writer, &mut reader, "QUIT").await?;

    Ok(())
}
