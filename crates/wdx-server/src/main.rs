//! Parameter service daemon binary.
//!
//! # Usage
//!
//! ```bash
//! wdx-server --ipc-bind 0.0.0.0:7300 --http-bind 0.0.0.0:8080
//! ```

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wdx_server::{Server, ServerRuntimeConfig};

/// Parameter service fabric daemon
#[derive(Parser, Debug)]
#[command(name = "wdx-server")]
#[command(about = "IPC object-management and HTTP file-transfer daemon")]
#[command(version)]
struct Args {
    /// Address the IPC listener binds to
    #[arg(long, default_value = "0.0.0.0:7300")]
    ipc_bind: String,

    /// Address the HTTP file-transfer listener binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    http_bind: String,

    /// Seconds an allocated upload id stays valid before it expires unclaimed
    #[arg(long, default_value = "60")]
    upload_id_timeout_secs: u16,

    /// Single origin the file-transfer frontend's CORS layer allows
    #[arg(long, default_value = "*")]
    cors_allow_origin: String,

    /// Maximum concurrent IPC connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("parameter service daemon starting");

    let config = ServerRuntimeConfig {
        ipc_bind_address: args.ipc_bind,
        http_bind_address: args.http_bind,
        upload_id_timeout_secs: args.upload_id_timeout_secs,
        cors_allow_origin: args.cors_allow_origin,
        max_connections: args.max_connections,
    };

    let server = Server::bind(config).await?;
    tracing::info!(ipc = %server.ipc_local_addr()?, http = %server.http_local_addr()?, "daemon listening");

    server.run().await?;

    Ok(())
}
