//! Server error types.

use thiserror::Error;

/// Server operation errors.
///
/// Protocol-level refusals (name clash, too many offers, ...) are never
/// errors; they are denial replies sent back to the client.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket-level failures from the transports.
    #[error("transport error: {0}")]
    Transport(#[from] gavel_network::TransportError),

    /// The snapshot sidecar exists but cannot be parsed; startup aborts.
    #[error("snapshot file is corrupt at line {line}: {detail}")]
    SnapshotCorrupt { line: usize, detail: String },

    /// Configuration file problems.
    #[error("config error: {0}")]
    Config(String),

    /// IO errors outside the transports (snapshot file access).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn snapshot_corrupt(line: usize, detail: impl Into<String>) -> Self {
        Self::SnapshotCorrupt {
            line,
            detail: detail.into(),
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
