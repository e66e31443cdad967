//! # Gavel Auction Server
//!
//! Server core of the distributed auction service. Clients register by name
//! over the datagram endpoint, attach a companion stream for push
//! notifications, offer items, bid, and receive outcomes. Three service
//! loops multiplex the two transports onto completion queues; auction state
//! lives behind a single lock and survives restarts through a textual
//! snapshot sidecar.

pub mod config;
pub mod connection;
pub mod error;
pub mod item;
pub mod registry;
pub mod server;
pub mod snapshot;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
