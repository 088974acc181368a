//! Volta - Main Entry Point

use api::{init_logging, run_server, ServerError, VoltaConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let path = std::env::args().nth(1);
    let config = VoltaConfig::load(path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Volta v{} ({}) ===", env!("CARGO_PKG_VERSION"), config.device_name);
    run_server(config).await
}
