//! Client binary: `client [NAME] [HOST] [PORT]`, number read from stdin.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use sum_exchange::client::{self, ClientOutcome};
use sum_exchange::config::ClientArgs;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ClientArgs::parse();

    // Logs go to stderr; stdout carries the report.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let number = match client::read_number(io::stdin().lock()) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("[client] {e}");
            return ExitCode::FAILURE;
        }
    };

    match client::run(&args, number, &mut io::stdout()).await {
        Ok(ClientOutcome::Completed(response)) => {
            debug!(sum = response.sum, "Exchange completed");
            ExitCode::SUCCESS
        }
        Ok(ClientOutcome::ShutdownRequested) => ExitCode::SUCCESS,
        Err(e) if e.is_connection_failure() => {
            eprintln!("[client] Connection failed: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("[client] Error: {e}");
            ExitCode::FAILURE
        }
    }
}
