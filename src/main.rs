//! Server binary: `server [PORT]`.

use std::sync::Arc;

use sum_exchange::config::Config;
use sum_exchange::server::Server;
use sum_exchange::shutdown::Shutdown;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        server_name = %config.identity.name,
        server_number = config.identity.number,
        max_connections = config.max_connections,
        read_timeout_ms = config.read_timeout.as_millis() as u64,
        drain_timeout_ms = config.drain_timeout.as_millis() as u64,
        "Starting sum-exchange server"
    );

    let shutdown = Arc::new(Shutdown::new());
    let server = Server::bind(&config, Arc::clone(&shutdown)).await?;

    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match termination_signal().await {
            Ok(()) => {
                info!("Termination signal received");
                signal_shutdown.trigger();
            }
            Err(e) => warn!(error = %e, "Failed to listen for termination signals"),
        }
    });

    server.run().await;
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
#[cfg(unix)]
async fn termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
