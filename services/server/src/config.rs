//! Server configuration.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address both endpoints bind on.
    pub bind_ip: IpAddr,

    /// Port shared by the datagram endpoint and the stream listener.
    pub port: u16,

    /// Full auction lifetime. The same value measures remaining time when
    /// live auctions are revived from the snapshot, so it must not change
    /// between a save and the restart that loads it.
    pub auction_duration_ms: u64,

    /// Snapshot sidecar file.
    pub snapshot_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: "127.0.0.1".parse().expect("loopback address"),
            port: 4070,
            auction_duration_ms: 3000,
            snapshot_path: PathBuf::from("connections.dat"),
        }
    }
}

impl ServerConfig {
    pub fn auction_duration(&self) -> Duration {
        Duration::from_millis(self.auction_duration_ms)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_complete() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4070);
        assert_eq!(config.auction_duration(), Duration::from_secs(3));
        assert_eq!(config.snapshot_path, PathBuf::from("connections.dat"));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 5071\nauction_duration_ms = 500").unwrap();
        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 5071);
        assert_eq!(config.auction_duration(), Duration::from_millis(500));
        assert_eq!(config.bind_ip, ServerConfig::default().bind_ip);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(matches!(
            ServerConfig::from_file(file.path()),
            Err(ServerError::Config(_))
        ));
    }
}
