//! CardBridge Transport Layer
//!
//! Provides network transport for CardBridge:
//! - TCP: Raw TCP connections speaking CBP
//! - WebSocket: Browser-compatible transport, one CBP command per frame

pub mod tcp;
#[cfg(feature = "websocket")]
pub mod websocket;
pub mod handler;

pub use tcp::TcpServer;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketServer;
pub use handler::ConnectionHandler;
