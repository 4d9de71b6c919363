//! Naming server binary.

use std::net::IpAddr;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use loomfs_common::{REGISTRATION_PORT, SERVICE_PORT};
use loomfs_naming::server::{NamingServer, NamingServerConfig};

#[derive(Parser)]
#[command(name = "loomfs-naming")]
#[command(about = "LoomFS naming server", long_about = None)]
struct Cli {
    /// Address to bind the listeners on.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Client-facing service port.
    #[arg(long, default_value_t = SERVICE_PORT)]
    service_port: u16,

    /// Storage-facing registration port.
    #[arg(long, default_value_t = REGISTRATION_PORT)]
    registration_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let server = NamingServer::start(NamingServerConfig {
        host: cli.host,
        service_port: cli.service_port,
        registration_port: cli.registration_port,
    })
    .await?;

    tokio::signal::ctrl_c().await?;
    server.stop();
    Ok(())
}
