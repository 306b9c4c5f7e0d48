//! Blackjack table server.
//!
//! Usage: cargo run -p blackjack_web --bin blackjack-server -- --port 8080

use blackjack_web::{init_logging, ServerArgs, ServiceSettings, WebServer};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = ServerArgs::parse();
    let resolved = ServiceSettings::load(&args)?;
    let settings = resolved.settings;

    init_logging(settings.log_format)?;
    tracing::info!(
        host = %settings.host,
        port = settings.port,
        tick_interval_ms = settings.tick_interval_ms,
        max_fetch_failures = settings.max_fetch_failures,
        sources = ?resolved.sources,
        "Starting blackjack server"
    );

    let handle = WebServer::new(settings)?.start().await?;
    println!("Server running at http://{}", handle.address());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down server");
    handle.shutdown().await?;
    Ok(())
}
