//! Error taxonomy for the transport and the wire protocol.
//!
//! Neither kind is fatal to a server: a [`ConnectionError`] drops the one
//! connection it concerns, a [`ProtocolError`] drops the one line it came from.

use std::time::Duration;
use thiserror::Error;

/// Failure on an accept, connect, receive or send boundary.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not resolve host {host:?}")]
    Resolve { host: String },

    #[error("connection to {host}:{port} timed out after {timeout:?}")]
    Timeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("connection closed by peer")]
    Closed,

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// A line on the wire that could not be understood.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected an integer handshake line, got {0:?}")]
    Handshake(String),

    #[error("snake body needs at least two vertices, got {0}")]
    ShortBody(usize),

    #[error("server rejected the connection: {0}")]
    Rejected(String),
}
