//! CBP Command types

use cardbridge_core::TransactionDraft;

/// A parsed CBP command
#[derive(Debug, Clone)]
pub enum Command {
    /// CHECKNFCSTATUS (alias: NFCSTATUS)
    CheckNfcStatus,

    /// STARTSCAN (alias: SCAN)
    StartScan,

    /// STOPSCAN (alias: STOP)
    StopScan,

    /// SAVETRANSACTION [NAME <s>] [TOKEN <s>] [AMOUNT <f>] [STATUS <s>]
    /// (alias: SAVE). Field validation is the bridge's job, not the parser's.
    SaveTransaction { draft: TransactionDraft },

    /// GETHISTORY (alias: HISTORY)
    GetHistory,

    /// PING
    Ping,

    /// QUIT
    Quit,

    /// Any unrecognized command word, carried so the router can answer it
    /// with the not-implemented response.
    Unknown { name: String },
}

impl Command {
    /// Canonical name for logging.
    pub fn name(&self) -> &str {
        match self {
            Command::CheckNfcStatus => "checkNfcStatus",
            Command::StartScan => "startScan",
            Command::StopScan => "stopScan",
            Command::SaveTransaction { .. } => "saveTransaction",
            Command::GetHistory => "getHistory",
            Command::Ping => "ping",
            Command::Quit => "quit",
            Command::Unknown { name } => name,
        }
    }
}
