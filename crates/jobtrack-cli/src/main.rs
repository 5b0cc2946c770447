//! `jobtrack` - reconcile a job application sheet against the ATS pages it
//! links to.

mod cli;
mod commands;

use clap::Parser;
use tracing::{error, info};

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,jobtrack=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    // Missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = cli::Args::parse();
    info!("Starting Jobtrack v{}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = cli::dispatch(args).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
