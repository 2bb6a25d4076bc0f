//! Resilient service gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                    SERVICE GATEWAY                    │
//!                        │                                                       │
//!   Client Request       │  ┌─────────┐    ┌──────────┐    ┌────────────┐        │
//!   ─────────────────────┼─▶│  http   │───▶│ routing  │───▶│  dispatch  │        │
//!                        │  │ server  │    │  router  │    │ dispatcher │        │
//!                        │  └─────────┘    └──────────┘    └─────┬──────┘        │
//!                        │                                       │               │
//!                        │                                       ▼               │
//!                        │                               ┌──────────────┐        │
//!                        │                               │  resilience  │        │
//!                        │                               │ registry + cb│        │
//!                        │                               └──────┬───────┘        │
//!                        │                                      │                │
//!   Client Response      │  ┌──────────┐                 ┌──────▼───────┐        │
//!   ◀────────────────────┼──│ response │◀────────────────│   upstream   │◀───────┼─── Backend
//!                        │  │ or 503   │                 │    client    │        │    Service
//!                        │  └──────────┘                 └──────────────┘        │
//!                        │                                                       │
//!                        │  ┌─────────────────────────────────────────────────┐  │
//!                        │  │             Cross-Cutting Concerns              │  │
//!                        │  │  ┌────────┐ ┌────────┐ ┌──────────┐ ┌────────┐  │  │
//!                        │  │  │ config │ │ health │ │observa-  │ │ admin  │  │  │
//!                        │  │  │        │ │ checks │ │ bility   │ │  API   │  │  │
//!                        │  │  └────────┘ └────────┘ └──────────┘ └────────┘  │  │
//!                        │  │  ┌───────────────────────────────────────────┐  │  │
//!                        │  │  │        lifecycle: startup/shutdown        │  │  │
//!                        │  │  └───────────────────────────────────────────┘  │  │
//!                        │  └─────────────────────────────────────────────────┘  │
//!                        └───────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;

use service_gateway::config::{load_config, Environment, GatewayConfig};
use service_gateway::lifecycle::signals;
use service_gateway::observability::{logging, metrics};
use service_gateway::{Gateway, HttpServer, Shutdown};

const DEFAULT_CONFIG: &str = "gateway.toml";

#[derive(Parser, Debug)]
#[command(name = "service-gateway", version, about = "Resilient service gateway")]
struct Args {
    /// Path to the TOML configuration file (default: ./gateway.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured environment (development or production)
    #[arg(short, long, value_parser = parse_environment)]
    environment: Option<Environment>,
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    match value.to_ascii_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(format!("unknown environment {other}")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => load_config(Path::new(DEFAULT_CONFIG))?,
        None => GatewayConfig::default(),
    };
    if let Some(environment) = args.environment {
        config.environment = environment;
    }

    logging::init(&config.observability, config.environment)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        environment = ?config.environment,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let gateway = Gateway::bootstrap(config, &shutdown)?;

    let listener = TcpListener::bind(&gateway.config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(gateway, shutdown).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
