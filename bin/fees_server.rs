//! # Fees API Server
//!
//! Serves the protocol fee metrics API backed by the upstream aggregate
//! source and the tiered value cache.
//!
//! ## Overview
//!
//! This service:
//! - Exposes `/api/v1/fees`, `/api/v1/fees/:id` and `/api/v1/protocols`
//! - Caches upstream snapshots in process (5 minutes by default) and serves
//!   stale data when a refresh fails
//! - Runs with either cache tier disabled when its URL is not configured
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin fees_server
//! ```
//!
//! Press Ctrl+C to stop gracefully.

use anyhow::Result;
use clap::Parser;
use fee_metrics_sdk::{api_server, settings::Settings};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "fees_server", about = "Protocol fee metrics API server")]
struct Args {
    /// Override the listen host from Config.toml
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port from Config.toml
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();

    println!("🚀 Starting Fee Metrics API Server");
    println!("═══════════════════════════════════════════════════════════════════\n");

    // 1. Load settings
    let mut settings = Settings::new()?;
    if let Some(host) = args.host {
        settings.api.host = host;
    }
    if let Some(port) = args.port {
        settings.api.port = port;
    }
    println!("✅ Settings loaded");

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log.level.clone()),
    )
    .init();

    // 2. Observability
    #[cfg(feature = "observability")]
    if settings.metrics.enabled {
        fee_metrics_sdk::metrics::init_prometheus_exporter(settings.metrics.port)?;
        println!("✅ Prometheus exporter on port {}", settings.metrics.port);
    }
    fee_metrics_sdk::metrics::describe_metrics();

    if settings.stores.redis_url.is_none() {
        println!("⚠️  Fast tier disabled (REDIS_URL not set)");
    }
    if settings.stores.database_url.is_none() {
        println!("⚠️  Durable tier disabled (DATABASE_URL not set)");
    }

    // 3. Graceful shutdown on Ctrl+C
    tokio::spawn(async {
        if signal::ctrl_c().await.is_ok() {
            println!("\n🛑 Ctrl+C received, shutting down...");
            api_server::shutdown();
        }
    });

    // 4. Serve until shutdown
    api_server::start_server(settings).await?;

    println!("✅ Server stopped gracefully");
    Ok(())
}
