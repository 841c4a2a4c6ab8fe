//! CBP - Card Bridge Protocol
//!
//! A text-based protocol inspired by Redis RESP for driving an NFC card
//! reader bridge.
//!
//! ## Command Format
//! ```text
//! COMMAND [OPTIONS]
//! ```
//!
//! ## Response Format
//! ```text
//! +OK [message]            # Acknowledgement
//! -ERR <code> <message>    # Error
//! :<n>                     # Integer
//! $<length>\r\n<data>      # Bulk data
//! #t / #f                  # Boolean
//! *<count>\r\n<items>      # Array
//! ?<command>               # Not implemented
//! ```

pub mod command;
pub mod response;
pub mod parser;
pub mod error;

pub use command::Command;
pub use response::Response;
pub use parser::Parser;
pub use error::{ProtocolError, ProtocolResult};
