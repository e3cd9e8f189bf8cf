//! A3S Store CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_store_cli::commands::{dispatch, Cli, ExitError};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        let code = e.downcast_ref::<ExitError>().map_or(1, |e| e.code);
        std::process::exit(code);
    }
}
