//! Transport error types.

use std::net::SocketAddr;
use thiserror::Error;

/// Socket-level transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Endpoint-level failures (bind, local address lookup, ...).
    #[error("network error: {message}")]
    Network {
        message: String,
        source: Option<std::io::Error>,
    },

    /// Per-connection failures on an attached stream.
    #[error("connection error: {message} (remote: {remote:?})")]
    Connection {
        message: String,
        remote: Option<SocketAddr>,
        source: Option<std::io::Error>,
    },
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn connection(
        message: impl Into<String>,
        remote: Option<SocketAddr>,
        source: std::io::Error,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            remote,
            source: Some(source),
        }
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
