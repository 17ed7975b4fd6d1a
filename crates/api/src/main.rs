//! Scoring API - Main Entry Point
//!
//! Usage: `scoring-api [config-file]`

use api::{init_logging, run_server, ApiConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = ApiConfig::load(config_path.as_deref())?;

    init_logging(config.log_level());

    info!("=== Tabular Scoring API v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Bundle: {}", config.bundle_path.display());

    run_server(config).await
}
