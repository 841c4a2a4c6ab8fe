//! Domain types shared across the bridge

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier delivered by a successful card scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// NFC adapter state as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcStatus {
    NotSupported,
    Disabled,
    Enabled,
}

impl NfcStatus {
    /// Integer code delivered for a status query: 0 not supported,
    /// 1 disabled, 2 enabled.
    pub fn code(&self) -> i64 {
        match self {
            NfcStatus::NotSupported => 0,
            NfcStatus::Disabled => 1,
            NfcStatus::Enabled => 2,
        }
    }
}

/// A processed card transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub name: String,
    pub token: String,
    pub amount: f64,
    pub status: Option<String>,
    /// Milliseconds since the Unix epoch, set when the record is built.
    pub created_at: u64,
}

impl Transaction {
    pub fn new(
        name: impl Into<String>,
        token: impl Into<String>,
        amount: f64,
        status: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
            amount,
            status,
            created_at: now_millis(),
        }
    }
}

/// Unvalidated transaction fields as received from a caller
#[derive(Debug, Clone, Default)]
pub struct TransactionDraft {
    pub name: Option<String>,
    pub token: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
}

impl TransactionDraft {
    /// Validate the draft into a transaction. Name, token, and amount are
    /// required; status is optional.
    pub fn build(self) -> Result<Transaction, BridgeError> {
        match (self.name, self.token, self.amount) {
            (Some(name), Some(token), Some(amount)) => {
                Ok(Transaction::new(name, token, amount, self.status))
            }
            _ => Err(BridgeError::MissingDetails),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_builds_with_required_fields() {
        let draft = TransactionDraft {
            name: Some("Lunch".into()),
            token: Some("tok-1".into()),
            amount: Some(4.5),
            status: None,
        };

        let tx = draft.build().unwrap();
        assert_eq!(tx.name, "Lunch");
        assert_eq!(tx.token, "tok-1");
        assert_eq!(tx.amount, 4.5);
        assert!(tx.status.is_none());
        assert!(tx.created_at > 0);
    }

    #[test]
    fn test_draft_rejects_missing_fields() {
        let missing_name = TransactionDraft {
            token: Some("tok-1".into()),
            amount: Some(1.0),
            ..Default::default()
        };
        let missing_token = TransactionDraft {
            name: Some("Lunch".into()),
            amount: Some(1.0),
            ..Default::default()
        };
        let missing_amount = TransactionDraft {
            name: Some("Lunch".into()),
            token: Some("tok-1".into()),
            ..Default::default()
        };

        for draft in [missing_name, missing_token, missing_amount] {
            let err = draft.build().unwrap_err();
            assert_eq!(err.to_string(), "Missing transaction details");
        }
    }

    #[test]
    fn test_nfc_status_codes() {
        assert_eq!(NfcStatus::NotSupported.code(), 0);
        assert_eq!(NfcStatus::Disabled.code(), 1);
        assert_eq!(NfcStatus::Enabled.code(), 2);
    }
}
