//! Render gateway
//!
//! Dispatch and trust boundary in front of a server-side rendering engine.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────────┐
//!                        │                     RENDER GATEWAY                    │
//!                        │                                                       │
//!   Client Request       │  ┌──────────┐   upgrade?   ┌───────────────────────┐  │
//!   ─────────────────────┼─▶│dispatcher│─────────────▶│ render server sockets │──┼──▶ Render
//!                        │  └────┬─────┘              └───────────────────────┘  │    Server
//!                        │       │ ordinary chain                                 │
//!                        │       ▼                                                │
//!                        │  ┌──────────┐   ┌──────────┐  ┌───────────┐  ┌─────┐  │
//!                        │  │  guard   │──▶│  client  │─▶│prerendered│─▶│ ssr │──┼──▶ Render
//!                        │  │(403/pass)│   │  assets  │  │  pages    │  │     │  │    Server
//!                        │  └──────────┘   └──────────┘  └───────────┘  └─────┘  │
//!                        │                                                       │
//!                        │  manifest (routes, nodes, cascade)   trust (origin,   │
//!                        │  config / observability              client address) │
//!                        └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use render_gateway::config::load_config;
use render_gateway::http::server::shutdown_signal;
use render_gateway::observability;
use render_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "render-gateway", version, about = "Dispatch and trust boundary for a rendering server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prefix for environment overrides (e.g. `APP_` reads `APP_ORIGIN`)
    #[arg(long, default_value = "")]
    env_prefix: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref(), &args.env_prefix)?;
    observability::logging::init_logging(&config.observability);

    tracing::info!("render-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        address_header = ?config.trust.address_header,
        forwarding_depth = config.trust.forwarding_depth,
        fixed_origin = ?config.trust.origin,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        observability::metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
