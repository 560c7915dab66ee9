//! librarium-server: library management HTTP server.
//!
//! Usage:
//!   librarium-server [--config librarium.toml] [--port 8080] [--database-url sqlite://librarium.db]
//!
//! Environment variables:
//!   DATABASE_URL                   - SQLite connection string
//!   LIBRARIUM_BIND                 - Address to bind to (default: 0.0.0.0)
//!   LIBRARIUM_PORT                 - Port to listen on (default: 8080)
//!   LIBRARIUM_SESSION_TTL_HOURS    - Session lifetime (default: 24)
//!   LIBRARIUM_SWEEP_INTERVAL_SECS  - Overdue sweep period (default: 86400)
//!   RUST_LOG                       - Log filter (default: info,sqlx=warn)

use clap::Parser;
use librarium::server;
use librarium::Args;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args = Args::parse();
    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    tracing::info!(
        addr = %config.listen_addr(),
        sweep_interval_secs = config.sweep_interval_secs,
        "librarium-server starting"
    );

    if let Err(e) = server::run(config).await {
        tracing::error!(error = %format!("{:#}", e), "fatal error");
        std::process::exit(1);
    }
}
