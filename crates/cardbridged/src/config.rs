//! Configuration file support for the daemon
//!
//! Every field is optional; command-line flags take precedence over the
//! file, and built-in defaults apply when neither is given.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Contents of `cardbridge.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Bind address for both servers
    pub bind: Option<String>,
    /// TCP port
    pub tcp_port: Option<u16>,
    /// WebSocket port
    pub ws_port: Option<u16>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database path; in-memory store when absent
    pub db: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// JSONL event log path
    pub jsonl: Option<PathBuf>,
    /// Drop all events instead of recording them
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    /// Adapter status to report: "enabled", "disabled" or "not-supported"
    pub status: Option<String>,
    /// Simulated card pool, cycled on consecutive scans
    #[serde(default)]
    pub cards: Vec<String>,
    /// Simulated delay before a card appears, in milliseconds
    pub tap_delay_ms: Option<u64>,
    /// Fail the first scan with this message before serving the card pool
    pub fail_first: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            bind = "0.0.0.0"
            tcp_port = 9000
            ws_port = 9001

            [storage]
            db = "/var/lib/cardbridge/cards.db"

            [telemetry]
            jsonl = "/var/log/cardbridge/events.jsonl"
            disabled = false

            [scanner]
            status = "enabled"
            cards = ["stu-1001", "stu-1002"]
            tap_delay_ms = 1500
            fail_first = "tag lost"
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.tcp_port, Some(9000));
        assert_eq!(config.ws_port, Some(9001));
        assert_eq!(
            config.storage.db.as_deref(),
            Some(Path::new("/var/lib/cardbridge/cards.db"))
        );
        assert!(!config.telemetry.disabled);
        assert_eq!(config.scanner.cards.len(), 2);
        assert_eq!(config.scanner.tap_delay_ms, Some(1500));
        assert_eq!(config.scanner.fail_first.as_deref(), Some("tag lost"));
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.bind.is_none());
        assert!(config.tcp_port.is_none());
        assert!(config.storage.db.is_none());
        assert!(!config.telemetry.disabled);
        assert!(config.scanner.cards.is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<Config, _> = toml::from_str("unknown_key = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardbridge.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "tcp_port = 7300").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tcp_port, Some(7300));

        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
