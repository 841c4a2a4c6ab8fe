//! CardBridge Bundled Backends
//!
//! Implementations of the core backend seams the daemon ships with:
//! - Sim: a simulated scanner for development and tests
//! - Memory (default): fast, volatile transaction store
//! - SQLite: embedded transaction persistence

pub mod memory;
pub mod sim;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
pub use sim::{SimScanner, SimScannerConfig};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
