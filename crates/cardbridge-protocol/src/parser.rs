//! CBP Command Parser

use crate::command::Command;
use crate::error::{ProtocolError, ProtocolResult};
use bytes::BytesMut;
use cardbridge_core::TransactionDraft;

/// Maximum message size (1MB)
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// CBP Protocol Parser
pub struct Parser {
    buffer: BytesMut,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) -> ProtocolResult<()> {
        if self.buffer.len() + data.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: self.buffer.len() + data.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Try to parse a complete command from the buffer
    pub fn parse(&mut self) -> ProtocolResult<Option<Command>> {
        // Find line ending
        let line_end = match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => return Ok(None), // Incomplete
        };

        // Extract line (excluding \r\n or \n)
        let line_len = if line_end > 0 && self.buffer[line_end - 1] == b'\r' {
            line_end - 1
        } else {
            line_end
        };

        let line = String::from_utf8_lossy(&self.buffer[..line_len]).to_string();

        // Remove the parsed line from buffer
        let _ = self.buffer.split_to(line_end + 1);

        // Parse the command
        Self::parse_line(&line).map(Some)
    }

    /// Parse a single command line
    fn parse_line(line: &str) -> ProtocolResult<Command> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::InvalidCommand("Empty command".into()));
        }

        let mut tokens = Tokenizer::new(line);
        let word = tokens
            .next()
            .ok_or_else(|| ProtocolError::InvalidCommand("Empty command".into()))?;

        // Trailing tokens after a no-argument command are ignored.
        match word.to_uppercase().as_str() {
            "CHECKNFCSTATUS" | "NFCSTATUS" => Ok(Command::CheckNfcStatus),
            "STARTSCAN" | "SCAN" => Ok(Command::StartScan),
            "STOPSCAN" | "STOP" => Ok(Command::StopScan),
            "SAVETRANSACTION" | "SAVE" => Self::parse_save(&mut tokens),
            "GETHISTORY" | "HISTORY" => Ok(Command::GetHistory),
            "PING" => Ok(Command::Ping),
            "QUIT" => Ok(Command::Quit),
            _ => Ok(Command::Unknown {
                name: word.to_string(),
            }),
        }
    }

    fn parse_save(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let mut draft = TransactionDraft::default();

        while let Some(opt) = tokens.next() {
            match opt.to_uppercase().as_str() {
                "NAME" => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| ProtocolError::MissingArgument("name value".into()))?;
                    draft.name = Some(name.to_string());
                }
                "TOKEN" => {
                    let token = tokens
                        .next()
                        .ok_or_else(|| ProtocolError::MissingArgument("token value".into()))?;
                    draft.token = Some(token.to_string());
                }
                "AMOUNT" => {
                    let amount = tokens
                        .next()
                        .ok_or_else(|| ProtocolError::MissingArgument("amount value".into()))?;
                    draft.amount = Some(amount.parse().map_err(|_| {
                        ProtocolError::InvalidArgument(format!("Invalid amount: {}", amount))
                    })?);
                }
                "STATUS" => {
                    let status = tokens
                        .next()
                        .ok_or_else(|| ProtocolError::MissingArgument("status value".into()))?;
                    draft.status = Some(status.to_string());
                }
                _ => {
                    return Err(ProtocolError::InvalidArgument(format!(
                        "Unknown option: {}",
                        opt
                    )))
                }
            }
        }

        Ok(Command::SaveTransaction { draft })
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple tokenizer that handles quoted strings
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a str> {
        // Skip whitespace
        while self.pos < self.input.len() && self.input[self.pos..].starts_with(' ') {
            self.pos += 1;
        }

        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.pos..];

        // Handle quoted string
        if remaining.starts_with('"') {
            if let Some(end) = remaining[1..].find('"') {
                let token = &remaining[1..end + 1];
                self.pos += end + 2;
                return Some(token);
            }
        }

        // Handle regular token
        let end = remaining.find(' ').unwrap_or(remaining.len());
        let token = &remaining[..end];
        self.pos += end;

        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_spellings() {
        let mut parser = Parser::new();
        parser.feed(b"checkNfcStatus\r\nNFCSTATUS\n").unwrap();

        assert!(matches!(
            parser.parse().unwrap().unwrap(),
            Command::CheckNfcStatus
        ));
        assert!(matches!(
            parser.parse().unwrap().unwrap(),
            Command::CheckNfcStatus
        ));
    }

    #[test]
    fn test_parse_scan_commands() {
        let mut parser = Parser::new();
        parser.feed(b"startScan\r\nSTOP\r\n").unwrap();

        assert!(matches!(parser.parse().unwrap().unwrap(), Command::StartScan));
        assert!(matches!(parser.parse().unwrap().unwrap(), Command::StopScan));
    }

    #[test]
    fn test_parse_save() {
        let mut parser = Parser::new();
        parser
            .feed(b"saveTransaction NAME \"John Smith\" TOKEN tok-42 AMOUNT 12.5 STATUS Completed\r\n")
            .unwrap();

        let cmd = parser.parse().unwrap().unwrap();
        let Command::SaveTransaction { draft } = cmd else {
            panic!("expected saveTransaction, got {:?}", cmd);
        };
        assert_eq!(draft.name.as_deref(), Some("John Smith"));
        assert_eq!(draft.token.as_deref(), Some("tok-42"));
        assert_eq!(draft.amount, Some(12.5));
        assert_eq!(draft.status.as_deref(), Some("Completed"));
    }

    #[test]
    fn test_parse_save_options_any_order() {
        let mut parser = Parser::new();
        parser.feed(b"save AMOUNT 3 TOKEN t-1 NAME Bus\r\n").unwrap();

        let cmd = parser.parse().unwrap().unwrap();
        let Command::SaveTransaction { draft } = cmd else {
            panic!("expected saveTransaction, got {:?}", cmd);
        };
        assert_eq!(draft.name.as_deref(), Some("Bus"));
        assert_eq!(draft.amount, Some(3.0));
        assert!(draft.status.is_none());
    }

    #[test]
    fn test_parse_save_missing_fields_is_not_a_parse_error() {
        // The parser accepts an incomplete draft; the bridge rejects it.
        let mut parser = Parser::new();
        parser.feed(b"SAVE NAME Lunch\r\n").unwrap();

        let cmd = parser.parse().unwrap().unwrap();
        assert!(matches!(cmd, Command::SaveTransaction { .. }));
    }

    #[test]
    fn test_parse_save_invalid_amount() {
        let mut parser = Parser::new();
        parser.feed(b"SAVE AMOUNT abc\r\n").unwrap();

        let err = parser.parse().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArgument(_)));
        assert_eq!(err.code(), "INVALID_ARG");
    }

    #[test]
    fn test_parse_save_unknown_option() {
        let mut parser = Parser::new();
        parser.feed(b"SAVE COLOR red\r\n").unwrap();

        let err = parser.parse().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArgument(_)));
    }

    #[test]
    fn test_parse_unknown_command() {
        let mut parser = Parser::new();
        parser.feed(b"fooBar 1 2\r\n").unwrap();

        let cmd = parser.parse().unwrap().unwrap();
        assert!(matches!(cmd, Command::Unknown { ref name } if name == "fooBar"));
    }

    #[test]
    fn test_trailing_tokens_ignored() {
        let mut parser = Parser::new();
        parser.feed(b"stopScan now please\r\n").unwrap();

        assert!(matches!(parser.parse().unwrap().unwrap(), Command::StopScan));
    }

    #[test]
    fn test_incomplete_command() {
        let mut parser = Parser::new();
        parser.feed(b"startSc").unwrap();

        assert!(parser.parse().unwrap().is_none());

        parser.feed(b"an\r\n").unwrap();
        assert!(matches!(
            parser.parse().unwrap().unwrap(),
            Command::StartScan
        ));
    }

    #[test]
    fn test_oversized_input_rejected() {
        let mut parser = Parser::new();
        let big = vec![b'a'; MAX_MESSAGE_SIZE + 1];

        let err = parser.feed(&big).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
        assert_eq!(err.code(), "PARSE_ERROR");
    }
}
