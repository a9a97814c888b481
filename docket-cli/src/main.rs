//! Docket CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   docket serve            - Run the REST and realtime tiers
//!   docket rest             - Run the REST tier only
//!   docket realtime         - Run the realtime tier only
//!   docket broker           - Run a TCP broker server
//!   docket schema flatten   - Print flattened collection schemas

use clap::Parser;
use docket_cli::{handler, Cli};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
