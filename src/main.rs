//! Portainer MCP Server - Rust Implementation
//!
//! Serves the Portainer stack tools over MCP's HTTP/SSE transport.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use portainer_mcp_rs::config::{Args, Config};
use portainer_mcp_rs::error::Result;
use portainer_mcp_rs::mcp::{Dispatcher, SessionRegistry, ToolRegistry};
use portainer_mcp_rs::metrics::Metrics;
use portainer_mcp_rs::portainer::{ControlPlane, PortainerClient};
use portainer_mcp_rs::{tools, SERVER_NAME, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = match Config::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    info!("Portainer MCP Server v{}", VERSION);
    info!("Portainer: {}", config.portainer_url);

    let client: Arc<dyn ControlPlane> = Arc::new(PortainerClient::new(
        config.portainer_url.clone(),
        config.api_key.clone(),
        config.timeout(),
    )?);

    // Register tools, then freeze the registry
    let mut registry = ToolRegistry::new();
    tools::register_all_tools(&mut registry, client, config.timeout())?;
    info!("Registered {} MCP tools", registry.tool_count());

    let metrics = Metrics::new();
    let sessions = Arc::new(SessionRegistry::new(metrics.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        sessions,
        metrics,
        SERVER_NAME,
    ));

    portainer_mcp_rs::http::start_server(&config, dispatcher).await
}
