//! Auction server entry point.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gavel_server::{Server, ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path; flags below are ignored when set
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind_address: IpAddr,

    /// Port shared by the datagram and stream endpoints
    #[arg(short, long, default_value_t = 4070)]
    port: u16,

    /// Auction duration in milliseconds
    #[arg(long, default_value_t = 3000)]
    auction_duration_ms: u64,

    /// Snapshot file path
    #[arg(long, default_value = "connections.dat")]
    snapshot: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gavel_server=info,gavel_network=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => ServerConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig {
            bind_ip: args.bind_address,
            port: args.port,
            auction_duration_ms: args.auction_duration_ms,
            snapshot_path: args.snapshot,
        },
    };

    info!("starting auction server on {}:{}", config.bind_ip, config.port);
    let server = Server::bind(config).await?;
    server.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    server.shutdown().await;
    Ok(())
}
