//! CardBridge Soak / Load Test
//!
//! Hammers a running daemon with concurrent clients across every command.
//!
//! Run with: cargo run --example soak --release
//!
//! Make sure cardbridged is running with a card pool:
//! cargo run --bin cardbridged --release -- --cards stu-1001,stu-1002

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Barrier;

/// Soak test configuration
struct SoakConfig {
    /// Server address
    addr: SocketAddr,
    /// Number of concurrent clients
    clients: usize,
    /// Operations per client
    ops_per_client: usize,
}

/// Soak test results
#[derive(Debug)]
struct SoakResults {
    name: String,
    total_ops: u64,
    duration: Duration,
    successful: u64,
    failed: u64,
    ops_per_sec: f64,
    avg_latency_us: f64,
}

impl SoakResults {
    fn print(&self) {
        println!("\n╔══════════════════════════════════════════════════════════╗");
        println!("║  {} ", self.name);
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║  Total operations:    {:>10}                         ║", self.total_ops);
        println!("║  Successful:          {:>10}                         ║", self.successful);
        println!("║  Failed:              {:>10}                         ║", self.failed);
        println!("║  Duration:            {:>10.2?}                       ║", self.duration);
        println!("║  Throughput:          {:>10.0} ops/sec                ║", self.ops_per_sec);
        println!("║  Avg latency:         {:>10.0} µs                     ║", self.avg_latency_us);
        println!("╚══════════════════════════════════════════════════════════╝");
    }
}

/// TCP client for the soak test
struct SoakClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl SoakClient {
    async fn connect(addr: SocketAddr) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Send a command and read the first response line.
    async fn send(&mut self, cmd: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.writer.write_all(format!("{}\r\n", cmd).as_bytes()).await?;
        let mut response = String::new();
        self.reader.read_line(&mut response).await?;
        Ok(response)
    }

    /// Send a command whose success reply is a bulk string ($len + data).
    async fn send_bulk(&mut self, cmd: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let header = self.send(cmd).await?;
        if header.starts_with('$') {
            let mut data = String::new();
            self.reader.read_line(&mut data).await?;
        }
        Ok(header)
    }

    /// Fetch the history and drain every record line, returning the count.
    async fn fetch_history(&mut self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let header = self.send("getHistory").await?;
        let count: usize = header
            .trim()
            .strip_prefix('*')
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);

        for _ in 0..count {
            let mut len_line = String::new();
            self.reader.read_line(&mut len_line).await?;
            let mut record = String::new();
            self.reader.read_line(&mut record).await?;
        }

        Ok(count)
    }
}

/// Soak: checkNfcStatus operations
async fn soak_status(config: &SoakConfig) -> SoakResults {
    let barrier = Arc::new(Barrier::new(config.clients));
    let successful = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let total_latency_ns = Arc::new(AtomicU64::new(0));

    let mut handles = vec![];

    for _ in 0..config.clients {
        let addr = config.addr;
        let ops = config.ops_per_client;
        let barrier = barrier.clone();
        let successful = successful.clone();
        let failed = failed.clone();
        let total_latency = total_latency_ns.clone();

        handles.push(tokio::spawn(async move {
            let mut client = match SoakClient::connect(addr).await {
                Ok(c) => c,
                Err(_) => return,
            };

            // Wait for all clients to be ready
            barrier.wait().await;

            // Perform operations
            for _ in 0..ops {
                let start = Instant::now();
                let result = client.send("checkNfcStatus").await;
                let elapsed = start.elapsed();

                match result {
                    Ok(resp) if resp.starts_with(':') => {
                        successful.fetch_add(1, Ordering::Relaxed);
                        total_latency.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
                    }
                    _ => {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }

    let start = Instant::now();

    for handle in handles {
        let _ = handle.await;
    }

    let duration = start.elapsed();
    let total_ops = (config.clients * config.ops_per_client) as u64;
    let succ = successful.load(Ordering::Relaxed);
    let fail = failed.load(Ordering::Relaxed);
    let total_lat = total_latency_ns.load(Ordering::Relaxed);

    SoakResults {
        name: format!("STATUS Soak ({} clients × {} ops)", config.clients, config.ops_per_client),
        total_ops,
        duration,
        successful: succ,
        failed: fail,
        ops_per_sec: succ as f64 / duration.as_secs_f64(),
        avg_latency_us: if succ > 0 { (total_lat as f64 / succ as f64) / 1000.0 } else { 0.0 },
    }
}

/// Soak: saveTransaction operations
async fn soak_save(config: &SoakConfig) -> SoakResults {
    let barrier = Arc::new(Barrier::new(config.clients));
    let successful = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let total_latency_ns = Arc::new(AtomicU64::new(0));

    let mut handles = vec![];

    for client_id in 0..config.clients {
        let addr = config.addr;
        let ops = config.ops_per_client;
        let barrier = barrier.clone();
        let successful = successful.clone();
        let failed = failed.clone();
        let total_latency = total_latency_ns.clone();

        handles.push(tokio::spawn(async move {
            let mut client = match SoakClient::connect(addr).await {
                Ok(c) => c,
                Err(_) => return,
            };

            // Wait for all clients to be ready
            barrier.wait().await;

            // Perform operations
            for i in 0..ops {
                let cmd = format!(
                    "saveTransaction NAME soak TOKEN stu-{}-{} AMOUNT {}.5 STATUS Completed",
                    client_id, i, i
                );

                let start = Instant::now();
                let result = client.send(&cmd).await;
                let elapsed = start.elapsed();

                match result {
                    Ok(resp) if resp.starts_with("#t") => {
                        successful.fetch_add(1, Ordering::Relaxed);
                        total_latency.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
                    }
                    _ => {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }

    let start = Instant::now();

    for handle in handles {
        let _ = handle.await;
    }

    let duration = start.elapsed();
    let total_ops = (config.clients * config.ops_per_client) as u64;
    let succ = successful.load(Ordering::Relaxed);
    let fail = failed.load(Ordering::Relaxed);
    let total_lat = total_latency_ns.load(Ordering::Relaxed);

    SoakResults {
        name: format!("SAVE Soak ({} clients × {} ops)", config.clients, config.ops_per_client),
        total_ops,
        duration,
        successful: succ,
        failed: fail,
        ops_per_sec: succ as f64 / duration.as_secs_f64(),
        avg_latency_us: if succ > 0 { (total_lat as f64 / succ as f64) / 1000.0 } else { 0.0 },
    }
}

/// Soak: startScan operations (requires a configured card pool)
async fn soak_scan(config: &SoakConfig) -> SoakResults {
    let barrier = Arc::new(Barrier::new(config.clients));
    let successful = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let total_latency_ns = Arc::new(AtomicU64::new(0));

    let mut handles = vec![];

    for _ in 0..config.clients {
        let addr = config.addr;
        let ops = config.ops_per_client;
        let barrier = barrier.clone();
        let successful = successful.clone();
        let failed = failed.clone();
        let total_latency = total_latency_ns.clone();

        handles.push(tokio::spawn(async move {
            let mut client = match SoakClient::connect(addr).await {
                Ok(c) => c,
                Err(_) => return,
            };

            // Wait for all clients to be ready
            barrier.wait().await;

            // Perform operations
            for _ in 0..ops {
                let start = Instant::now();
                let result = client.send_bulk("startScan").await;
                let elapsed = start.elapsed();

                match result {
                    Ok(resp) if resp.starts_with('$') => {
                        successful.fetch_add(1, Ordering::Relaxed);
                        total_latency.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
                    }
                    _ => {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }

    let start = Instant::now();

    for handle in handles {
        let _ = handle.await;
    }

    let duration = start.elapsed();
    let total_ops = (config.clients * config.ops_per_client) as u64;
    let succ = successful.load(Ordering::Relaxed);
    let fail = failed.load(Ordering::Relaxed);
    let total_lat = total_latency_ns.load(Ordering::Relaxed);

    SoakResults {
        name: format!("SCAN Soak ({} clients × {} ops)", config.clients, config.ops_per_client),
        total_ops,
        duration,
        successful: succ,
        failed: fail,
        ops_per_sec: succ as f64 / duration.as_secs_f64(),
        avg_latency_us: if succ > 0 { (total_lat as f64 / succ as f64) / 1000.0 } else { 0.0 },
    }
}

/// Soak: mixed workload of status, save, and stop
async fn soak_mixed(config: &SoakConfig) -> SoakResults {
    let barrier = Arc::new(Barrier::new(config.clients));
    let successful = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let total_latency_ns = Arc::new(AtomicU64::new(0));

    let mut handles = vec![];

    for client_id in 0..config.clients {
        let addr = config.addr;
        let ops = config.ops_per_client;
        let barrier = barrier.clone();
        let successful = successful.clone();
        let failed = failed.clone();
        let total_latency = total_latency_ns.clone();

        handles.push(tokio::spawn(async move {
            let mut client = match SoakClient::connect(addr).await {
                Ok(c) => c,
                Err(_) => return,
            };

            // Wait for all clients to be ready
            barrier.wait().await;

            // Mixed operations: 40% status, 40% save, 20% stop
            for i in 0..ops {
                let start = Instant::now();
                let ok = match i % 5 {
                    0 | 1 => client
                        .send("checkNfcStatus")
                        .await
                        .map(|r| r.starts_with(':')),
                    2 | 3 => {
                        let cmd = format!(
                            "save NAME mixed TOKEN stu-{}-{} AMOUNT 1.0",
                            client_id, i
                        );
                        client.send(&cmd).await.map(|r| r.starts_with("#t"))
                    }
                    _ => client.send("stopScan").await.map(|r| r.starts_with("+OK")),
                };
                let elapsed = start.elapsed();

                match ok {
                    Ok(true) => {
                        successful.fetch_add(1, Ordering::Relaxed);
                        total_latency.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
                    }
                    _ => {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }

    let start = Instant::now();

    for handle in handles {
        let _ = handle.await;
    }

    let duration = start.elapsed();
    let total_ops = (config.clients * config.ops_per_client) as u64;
    let succ = successful.load(Ordering::Relaxed);
    let fail = failed.load(Ordering::Relaxed);
    let total_lat = total_latency_ns.load(Ordering::Relaxed);

    SoakResults {
        name: format!("MIXED Soak ({} clients × {} ops)", config.clients, config.ops_per_client),
        total_ops,
        duration,
        successful: succ,
        failed: fail,
        ops_per_sec: succ as f64 / duration.as_secs_f64(),
        avg_latency_us: if succ > 0 { (total_lat as f64 / succ as f64) / 1000.0 } else { 0.0 },
    }
}

/// Test connection capacity
async fn soak_connections(addr: SocketAddr, max_clients: usize) -> SoakResults {
    let start = Instant::now();
    let mut handles = vec![];
    let successful = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));

    for _ in 0..max_clients {
        let addr = addr;
        let successful = successful.clone();
        let failed = failed.clone();

        handles.push(tokio::spawn(async move {
            match SoakClient::connect(addr).await {
                Ok(mut client) => {
                    if let Ok(resp) = client.send("PING").await {
                        if resp.contains("PONG") {
                            successful.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    }
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    let duration = start.elapsed();
    let succ = successful.load(Ordering::Relaxed);
    let fail = failed.load(Ordering::Relaxed);

    SoakResults {
        name: format!("Connection Soak ({} clients)", max_clients),
        total_ops: max_clients as u64,
        duration,
        successful: succ,
        failed: fail,
        ops_per_sec: succ as f64 / duration.as_secs_f64(),
        avg_latency_us: (duration.as_micros() as f64) / max_clients as f64,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║           CARDBRIDGE SOAK / LOAD TEST                    ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line args
    let args: Vec<String> = std::env::args().collect();
    let host = args
        .iter()
        .position(|a| a == "-H" || a == "--host")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("127.0.0.1");

    let port: u16 = args
        .iter()
        .position(|a| a == "-p" || a == "--port")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(7226);

    let clients: usize = args
        .iter()
        .position(|a| a == "-c" || a == "--clients")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let ops: usize = args
        .iter()
        .position(|a| a == "-n" || a == "--ops")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    println!("Configuration:");
    println!("  Server:     {}:{}", host, port);
    println!("  Clients:    {}", clients);
    println!("  Ops/client: {}", ops);
    println!();

    // Check connectivity
    print!("Connecting to server... ");
    match SoakClient::connect(addr).await {
        Ok(mut client) => match client.send("PING").await {
            Ok(resp) if resp.contains("PONG") => {
                println!("OK");
            }
            Ok(_) => {
                println!("ERROR: Unexpected response");
                return Ok(());
            }
            Err(e) => {
                println!("ERROR: {}", e);
                return Ok(());
            }
        },
        Err(e) => {
            println!("FAILED");
            println!("\nError: {}", e);
            println!("\nMake sure cardbridged is running with a card pool:");
            println!("  cargo run --bin cardbridged --release -- --cards stu-1001,stu-1002");
            return Ok(());
        }
    }

    let config = SoakConfig {
        addr,
        clients,
        ops_per_client: ops,
    };

    // Run the soak suites
    println!("\nRunning soak suites...");

    // 1. Connection soak
    soak_connections(addr, clients * 2).await.print();

    // 2. Status soak
    soak_status(&config).await.print();

    // 3. Save soak
    soak_save(&config).await.print();

    // 4. Scan soak
    soak_scan(&config).await.print();

    // 5. Mixed workload
    soak_mixed(&config).await.print();

    // Final sanity read: one client drains the full history
    if let Ok(mut client) = SoakClient::connect(addr).await {
        if let Ok(count) = client.fetch_history().await {
            println!("\nHistory records accumulated: {}", count);
        }
        let _ = client.send("QUIT").await;
    }

    println!("\n╔══════════════════════════════════════════════════════════╗");
    println!("║                    SOAK TEST COMPLETE                    ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    Ok(())
}
