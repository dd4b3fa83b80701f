//! Booking core entry point.

use std::process::ExitCode;

use app::{Config, telemetry};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Configuration and tracing
    let config = Config::from_env();
    telemetry::init_tracing(&config);

    // 2. Prometheus exporter
    if let Err(e) = telemetry::install_metrics(config.metrics_addr) {
        tracing::error!(error = %e, "failed to start metrics exporter");
        return ExitCode::FAILURE;
    }

    // 3. Store, services, and wait for shutdown
    match app::run(config, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "booking core failed to start");
            ExitCode::FAILURE
        }
    }
}
