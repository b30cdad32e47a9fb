use std::sync::Arc;

use clap::Parser;
use tokio::signal;

use siconfi_extractor::cli::Cli;
use siconfi_extractor::config::Config;
use siconfi_extractor::error::AppError;
use siconfi_extractor::pipeline::{
    ProgressReporter, StopSignal, channel, render_progress, run_extraction,
};
use siconfi_extractor::siconfi::{HttpTransport, Transport};
use siconfi_extractor::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(output_dir) = cli.output_dir.clone() {
        config.output_dir = output_dir;
    }

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        environment = %config.environment,
        base_url = %config.base_url,
        output_dir = %config.output_dir.display(),
        "Starting siconfi-extractor"
    );

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.base_url)?);

    let (tx, rx) = channel();
    let renderer = tokio::spawn(render_progress(rx));

    let stop = StopSignal::new();
    let watcher = tokio::spawn(watch_shutdown(stop.clone()));

    let request = cli.into_request();
    let result = run_extraction(
        &config,
        transport,
        &request,
        ProgressReporter::new(tx),
        stop,
    )
    .await;

    watcher.abort();
    if let Err(e) = renderer.await {
        tracing::warn!(error = %e, "Progress renderer ended abnormally");
    }

    let outcome = match result {
        Ok(_) => Ok(()),
        Err(AppError::DirectoryFetch(message)) => {
            tracing::warn!(error = %message, "Entity directory unavailable, nothing processed");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Extraction aborted");
            Err(e.into())
        }
    };

    telemetry_guard.shutdown();
    outcome
}

async fn watch_shutdown(stop: StopSignal) {
    shutdown_signal().await;
    stop.stop();
    tracing::info!("Stopping after the current group");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
