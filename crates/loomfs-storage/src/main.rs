//! Storage server binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use loomfs_storage::server::{
    StorageServer, StorageServerConfig, DEFAULT_CLIENT_PORT, DEFAULT_COMMAND_PORT,
};

#[derive(Parser)]
#[command(name = "loomfs-storage")]
#[command(about = "LoomFS storage server", long_about = None)]
struct Cli {
    /// Local directory whose contents this server hosts.
    #[arg(long)]
    root: PathBuf,

    /// Externally visible address to bind the interfaces on.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Client-facing storage port (0 = OS-assigned).
    #[arg(long, default_value_t = DEFAULT_CLIENT_PORT)]
    client_port: u16,

    /// Command port (0 = OS-assigned).
    #[arg(long, default_value_t = DEFAULT_COMMAND_PORT)]
    command_port: u16,

    /// Registration address of the naming server.
    #[arg(long, default_value = "127.0.0.1:6001")]
    naming: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let server = StorageServer::start(StorageServerConfig {
        root: cli.root,
        host: cli.host,
        client_port: cli.client_port,
        command_port: cli.command_port,
        naming: cli.naming,
    })
    .await?;

    tokio::signal::ctrl_c().await?;
    server.stop();
    Ok(())
}
