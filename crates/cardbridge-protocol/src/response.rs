//! CBP Response types

use bytes::{BufMut, BytesMut};
use cardbridge_core::Transaction;

/// A CBP response
#[derive(Debug, Clone)]
pub enum Response {
    /// +OK [message]
    Ok(Option<String>),

    /// -ERR <code> <message>
    Error { code: String, message: String },

    /// :<integer>
    Integer(i64),

    /// #t / #f
    Bool(bool),

    /// $<length>\r\n<data>
    Bulk(Vec<u8>),

    /// *<count>\r\n<items>
    Array(Vec<Response>),

    /// ?<command>
    NotImplemented { command: String },

    /// PONG
    Pong,
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(None)
    }

    pub fn ok_with_message(msg: impl Into<String>) -> Self {
        Response::Ok(Some(msg.into()))
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn scan_error(message: impl Into<String>) -> Self {
        Response::error("SCAN_ERROR", message)
    }

    pub fn store_error(message: impl Into<String>) -> Self {
        Response::error("STORE_ERROR", message)
    }

    /// Validation failure for an incomplete transaction.
    pub fn missing_details() -> Self {
        Response::error("ERROR", "Missing transaction details")
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Response::Bulk(data.into())
    }

    pub fn integer(n: i64) -> Self {
        Response::Integer(n)
    }

    pub fn boolean(b: bool) -> Self {
        Response::Bool(b)
    }

    pub fn array(items: Vec<Response>) -> Self {
        Response::Array(items)
    }

    /// History payload: one bulk JSON object per transaction.
    pub fn history(records: &[Transaction]) -> Self {
        let items = records
            .iter()
            .map(|tx| {
                let json = serde_json::to_string(tx).unwrap_or_else(|_| "null".to_string());
                Response::Bulk(json.into_bytes())
            })
            .collect();
        Response::Array(items)
    }

    pub fn not_implemented(command: impl Into<String>) -> Self {
        Response::NotImplemented {
            command: command.into(),
        }
    }

    pub fn pong() -> Self {
        Response::Pong
    }

    /// Encode the response to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the response into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Response::Ok(None) => {
                buf.put_slice(b"+OK\r\n");
            }
            Response::Ok(Some(msg)) => {
                buf.put_slice(b"+OK ");
                buf.put_slice(msg.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Error { code, message } => {
                buf.put_slice(b"-ERR ");
                buf.put_slice(code.as_bytes());
                buf.put_slice(b" ");
                buf.put_slice(message.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Integer(n) => {
                buf.put_slice(b":");
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Bool(b) => {
                buf.put_slice(if *b { b"#t\r\n" } else { b"#f\r\n" });
            }
            Response::Bulk(data) => {
                buf.put_slice(b"$");
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(data);
                buf.put_slice(b"\r\n");
            }
            Response::Array(items) => {
                buf.put_slice(b"*");
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
            Response::NotImplemented { command } => {
                buf.put_slice(b"?");
                buf.put_slice(command.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Pong => {
                buf.put_slice(b"+PONG\r\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ok() {
        let resp = Response::ok();
        assert_eq!(resp.encode().as_ref(), b"+OK\r\n");
    }

    #[test]
    fn test_encode_ok_with_message() {
        let resp = Response::ok_with_message("Stopped");
        assert_eq!(resp.encode().as_ref(), b"+OK Stopped\r\n");
    }

    #[test]
    fn test_encode_error() {
        let resp = Response::scan_error("tag lost");
        assert_eq!(resp.encode().as_ref(), b"-ERR SCAN_ERROR tag lost\r\n");
    }

    #[test]
    fn test_encode_missing_details() {
        let resp = Response::missing_details();
        assert_eq!(
            resp.encode().as_ref(),
            b"-ERR ERROR Missing transaction details\r\n"
        );
    }

    #[test]
    fn test_encode_integer() {
        let resp = Response::integer(2);
        assert_eq!(resp.encode().as_ref(), b":2\r\n");
    }

    #[test]
    fn test_encode_bool() {
        assert_eq!(Response::boolean(true).encode().as_ref(), b"#t\r\n");
        assert_eq!(Response::boolean(false).encode().as_ref(), b"#f\r\n");
    }

    #[test]
    fn test_encode_bulk() {
        let resp = Response::bulk(b"stu-1001".to_vec());
        assert_eq!(resp.encode().as_ref(), b"$8\r\nstu-1001\r\n");
    }

    #[test]
    fn test_encode_not_implemented() {
        let resp = Response::not_implemented("fooBar");
        assert_eq!(resp.encode().as_ref(), b"?fooBar\r\n");
    }

    #[test]
    fn test_encode_history() {
        let tx = Transaction {
            name: "Lunch".into(),
            token: "tok-1".into(),
            amount: 4.5,
            status: None,
            created_at: 0,
        };

        let resp = Response::history(&[tx]);
        let encoded = resp.encode();
        let text = std::str::from_utf8(encoded.as_ref()).unwrap();

        assert!(text.starts_with("*1\r\n$"));
        assert!(text.contains("\"name\":\"Lunch\""));
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn test_encode_empty_history() {
        let resp = Response::history(&[]);
        assert_eq!(resp.encode().as_ref(), b"*0\r\n");
    }
}
