//! CardBridge CLI Client
//!
//! Interactive command-line client for CardBridge daemons.
//!
//! # Usage
//!
//! ```bash
//! # Connect to local daemon
//! cardbridge
//!
//! # Connect to remote daemon
//! cardbridge --host kiosk-7.local --port 7226
//!
//! # Execute single command
//! cardbridge -c "checkNfcStatus"
//! ```

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// CardBridge Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "cardbridge")]
#[command(author, version, about = "CardBridge CLI - NFC card reader bridge client")]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "CARDBRIDGE_HOST")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "7226", env = "CARDBRIDGE_PORT")]
    port: u16,

    /// Execute command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let addr = format!("{}:{}", args.host, args.port);

    // Connect
    let mut stream = TcpStream::connect(&addr)
        .with_context(|| format!("Failed to connect to {}", addr))?;

    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    if !args.quiet {
        println!(
            "{}",
            format!(
                r#"
  ╔═╗╔╗   CardBridge CLI
  ║  ╠╩╗  Connected to {}
  ╚═╝╚═╝  Type 'help' for commands, 'quit' to exit
"#,
                addr
            )
            .cyan()
        );
    }

    // Single command mode
    if let Some(cmd) = args.command {
        return execute_command(&mut stream, &cmd);
    }

    // Interactive mode
    let mut rl = DefaultEditor::new()?;
    let history_path = dirs_next::home_dir()
        .map(|p| p.join(".cardbridge_history"))
        .unwrap_or_default();

    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", "cardbridge".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Handle local commands
                match line.to_uppercase().as_str() {
                    "QUIT" | "EXIT" => {
                        let _ = execute_command(&mut stream, "QUIT");
                        break;
                    }
                    "HELP" => {
                        print_help();
                        continue;
                    }
                    "CLEAR" => {
                        print!("\x1B[2J\x1B[1;1H");
                        continue;
                    }
                    _ => {}
                }

                // Execute remote command
                if let Err(e) = execute_command(&mut stream, line) {
                    eprintln!("{} {}", "Error:".red(), e);

                    // Try to reconnect
                    if let Ok(new_stream) = TcpStream::connect(&addr) {
                        stream = new_stream;
                        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
                        println!("{}", "Reconnected.".yellow());
                    } else {
                        eprintln!("{}", "Connection lost.".red());
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

fn execute_command(stream: &mut TcpStream, cmd: &str) -> Result<()> {
    // A scan waits for a card tap, which can take arbitrarily long; lift the
    // read timeout for it and rely on stopScan from another session instead.
    let word = cmd.split_whitespace().next().unwrap_or("").to_uppercase();
    let waits_for_card = matches!(word.as_str(), "STARTSCAN" | "SCAN");
    if waits_for_card {
        stream.set_read_timeout(None)?;
        println!("{}", "Waiting for card...".dimmed());
    }

    // Send command
    writeln!(stream, "{}", cmd)?;
    stream.flush()?;

    // Read response
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut response = String::new();
    reader.read_line(&mut response)?;

    // Parse and display response
    let response = response.trim();

    if response.starts_with("+OK") {
        println!("{}", response.green());
    } else if response.starts_with("+PONG") {
        println!("{}", "PONG".green());
    } else if response.starts_with("-ERR") {
        println!("{}", response.red());
    } else if response.starts_with(':') {
        // Integer (adapter status)
        println!("{}", response[1..].yellow());
    } else if response.starts_with('$') {
        // Bulk string (student id)
        let mut data = String::new();
        reader.read_line(&mut data)?;
        println!("{}", data.trim());
    } else if response.starts_with('*') {
        // History: each record is a bulk JSON object
        let count: usize = response[1..].parse().unwrap_or(0);
        if count == 0 {
            println!("{}", "(empty)".dimmed());
        }
        for i in 0..count {
            let mut len_line = String::new();
            reader.read_line(&mut len_line)?;
            let mut record = String::new();
            reader.read_line(&mut record)?;
            println!("{}) {}", i + 1, record.trim());
        }
    } else if response == "#t" {
        println!("{}", "true".green());
    } else if response == "#f" {
        println!("{}", "false".red());
    } else if let Some(name) = response.strip_prefix('?') {
        println!("{}", format!("(not implemented) {}", name).dimmed());
    } else {
        println!("{}", response);
    }

    if waits_for_card {
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"
{}

{}
  checkNfcStatus                         Adapter status (0=unsupported, 1=disabled, 2=enabled)
  startScan                              Wait for a card, returns the student id
  stopScan                               Cancel a waiting scan

{}
  saveTransaction NAME <s> TOKEN <s> AMOUNT <f> [STATUS <s>]
                                         Persist a transaction record
  getHistory                             List saved transactions, newest first

{}
  PING                                   Check connection
  QUIT                                   Close connection

{}
  help                                   Show this help
  clear                                  Clear screen
  quit/exit                              Exit CLI

{}
  Short aliases work too: nfcStatus, scan, stop, save, history.
  Quote multi-word values: saveTransaction NAME "John Smith" ...
"#,
        "CardBridge Commands".cyan().bold(),
        "Reader".yellow().bold(),
        "Transactions".yellow().bold(),
        "Server".yellow().bold(),
        "Local".yellow().bold(),
        "Notes".yellow().bold(),
    );
}

// Minimal dirs_next replacement for home directory
mod dirs_next {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
