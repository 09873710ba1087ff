//! # Flick relay server
//!
//! Broadcast relay for the shared-switch and live-cursor demo page.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! flick
//!
//! # Run with custom config
//! flick --config /path/to/flick.toml
//!
//! # Run with environment variables
//! FLICK_PORT=8080 FLICK_HOST=0.0.0.0 flick
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flick=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Flick relay on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
