//! CardBridge Daemon (cardbridged)
//!
//! The main server process for CardBridge - bridges an NFC student-card
//! reader to host applications over TCP and WebSocket.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (TCP on 7226, WebSocket on 7227)
//! cardbridged
//!
//! # Custom ports
//! cardbridged --tcp-port 7000 --ws-port 7001
//!
//! # With persistent transaction history
//! cardbridged --db /var/lib/cardbridge/cards.db
//!
//! # With a telemetry event log
//! cardbridged --telemetry /var/log/cardbridge/events.jsonl
//!
//! # Simulated reader options
//! cardbridged --cards stu-1001,stu-1002 --tap-delay-ms 1500
//!
//! # With configuration file
//! cardbridged --config /etc/cardbridge/cardbridge.toml
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};

use cardbridge_backend::{MemoryStore, SimScanner, SimScannerConfig, SqliteStore};
use cardbridge_core::telemetry::{install_panic_hook, JsonlSink, LogSink};
use cardbridge_core::{
    Bridge, NfcStatus, ScanError, Telemetry, TelemetrySink, TransactionStore,
};
use cardbridge_transport::{TcpServer, WebSocketServer};

use config::Config;

const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_TCP_PORT: u16 = 7226;
const DEFAULT_WS_PORT: u16 = 7227;

/// CardBridge Daemon - NFC student-card reader bridge
#[derive(Parser, Debug)]
#[command(name = "cardbridged")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on (default: 7226)
    #[arg(long, env = "CARDBRIDGE_TCP_PORT")]
    tcp_port: Option<u16>,

    /// WebSocket port to listen on (default: 7227)
    #[arg(long, env = "CARDBRIDGE_WS_PORT")]
    ws_port: Option<u16>,

    /// Bind address (default: 127.0.0.1)
    #[arg(long, env = "CARDBRIDGE_BIND")]
    bind: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "CARDBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CARDBRIDGE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Disable TCP server
    #[arg(long)]
    no_tcp: bool,

    /// Disable WebSocket server
    #[arg(long)]
    no_ws: bool,

    /// SQLite database path for transaction history (default: in-memory only)
    #[arg(long, env = "CARDBRIDGE_DB")]
    db: Option<PathBuf>,

    /// Telemetry JSONL file path
    #[arg(long, env = "CARDBRIDGE_TELEMETRY")]
    telemetry: Option<PathBuf>,

    /// Disable telemetry entirely
    #[arg(long)]
    no_telemetry: bool,

    /// Simulated card pool, comma-separated (cycled on consecutive scans)
    #[arg(long, env = "CARDBRIDGE_CARDS", value_delimiter = ',')]
    cards: Vec<String>,

    /// Simulated delay before a card appears, in milliseconds
    #[arg(long, env = "CARDBRIDGE_TAP_DELAY_MS")]
    tap_delay_ms: Option<u64>,

    /// Adapter status to report (enabled, disabled, not-supported)
    #[arg(long, env = "CARDBRIDGE_NFC_STATUS")]
    nfc_status: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Print banner
    print_banner();

    // Load configuration file; flags take precedence over it
    let config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            Config::load(path)?
        }
        None => Config::default(),
    };

    let bind = args
        .bind
        .clone()
        .or_else(|| config.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let tcp_port = args.tcp_port.or(config.tcp_port).unwrap_or(DEFAULT_TCP_PORT);
    let ws_port = args.ws_port.or(config.ws_port).unwrap_or(DEFAULT_WS_PORT);

    // Transaction store: SQLite when a path is given, in-memory otherwise
    let db_path = args.db.clone().or_else(|| config.storage.db.clone());
    let store: Arc<dyn TransactionStore> = match &db_path {
        Some(path) => {
            info!(path = %path.display(), "Opening SQLite transaction store");
            match SqliteStore::new(path) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, "Failed to open SQLite store, running in-memory only");
                    Arc::new(MemoryStore::new())
                }
            }
        }
        None => {
            info!("Using in-memory transaction store (no --db specified)");
            Arc::new(MemoryStore::new())
        }
    };

    // Simulated scanner
    let scanner = build_scanner(&args, &config);

    // Telemetry pipeline
    let telemetry = if args.no_telemetry || config.telemetry.disabled {
        info!("Telemetry disabled");
        Telemetry::disabled()
    } else {
        let mut sinks: Vec<Arc<dyn TelemetrySink>> = vec![Arc::new(LogSink)];

        let jsonl = args.telemetry.clone().or_else(|| config.telemetry.jsonl.clone());
        if let Some(path) = &jsonl {
            match JsonlSink::open(path) {
                Ok(sink) => {
                    info!(path = %path.display(), "Telemetry JSONL sink enabled");
                    sinks.push(Arc::new(sink));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to open telemetry file, logging only");
                }
            }
        }

        let (telemetry, worker) = Telemetry::new(sinks);
        tokio::spawn(worker.run());
        telemetry
    };

    install_panic_hook(telemetry.clone());

    // Shared bridge: one reader session for the whole process
    let bridge = Arc::new(Bridge::new(scanner, store, telemetry.clone()));

    info!(
        tcp_port = tcp_port,
        ws_port = ws_port,
        bind = %bind,
        persistent = db_path.is_some(),
        "Starting CardBridge daemon"
    );

    // Start servers
    let mut handles = Vec::new();

    if !args.no_tcp {
        let tcp_addr: SocketAddr = format!("{}:{}", bind, tcp_port).parse()?;
        let tcp_server = TcpServer::new(bridge.clone(), tcp_addr);
        handles.push(tokio::spawn(async move {
            if let Err(e) = tcp_server.run().await {
                tracing::error!(error = %e, "TCP server error");
            }
        }));
    }

    if !args.no_ws {
        let ws_addr: SocketAddr = format!("{}:{}", bind, ws_port).parse()?;
        let ws_server = WebSocketServer::new(bridge.clone(), ws_addr);
        handles.push(tokio::spawn(async move {
            if let Err(e) = ws_server.run().await {
                tracing::error!(error = %e, "WebSocket server error");
            }
        }));
    }

    if handles.is_empty() {
        anyhow::bail!("At least one transport must be enabled");
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Drain queued telemetry before exit
    telemetry.flush().await;

    Ok(())
}

fn build_scanner(args: &Args, config: &Config) -> Arc<SimScanner> {
    let status = args
        .nfc_status
        .as_deref()
        .or(config.scanner.status.as_deref())
        .map(parse_status)
        .unwrap_or(NfcStatus::Enabled);

    let cards = if args.cards.is_empty() {
        config.scanner.cards.clone()
    } else {
        args.cards.clone()
    };

    let tap_delay_ms = args.tap_delay_ms.or(config.scanner.tap_delay_ms).unwrap_or(0);

    if cards.is_empty() {
        info!("No card pool configured, scans wait until stopped");
    } else {
        info!(cards = cards.len(), tap_delay_ms = tap_delay_ms, "Simulated card pool configured");
    }

    let scanner = Arc::new(SimScanner::new(SimScannerConfig {
        status,
        cards,
        tap_delay: Duration::from_millis(tap_delay_ms),
    }));

    if let Some(message) = &config.scanner.fail_first {
        scanner.push_outcome(Err(ScanError::ReadFailed(message.clone())));
    }

    scanner
}

fn parse_status(raw: &str) -> NfcStatus {
    match raw.to_lowercase().as_str() {
        "disabled" => NfcStatus::Disabled,
        "not-supported" | "unsupported" => NfcStatus::NotSupported,
        _ => NfcStatus::Enabled,
    }
}

fn print_banner() {
    println!(
        r#"
  ╔═╗╔╗
  ║  ╠╩╗  CardBridge
  ╚═╝╚═╝  NFC Student Card Reader Bridge
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
