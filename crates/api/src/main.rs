//! Driver Drowsiness Monitor - Main Entry Point

use std::process::ExitCode;

use api::cli::{self, Cli};
use api::init_logging;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("=== Drowsy Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
