//! conductor - runs the Conductor complex as a standalone process.

#![allow(missing_docs)]

use clap::Parser;
use conductor_core::{Conductor, Config};
use dashmap::DashMap;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "conductor", version = conductor_core::VERSION)]
struct Args {
    /// Path to a YAML configuration file. Falls back to built-in
    /// defaults when omitted.
    #[arg(long, env = "CONDUCTOR_CONFIG")]
    config: Option<String>,
}

const SHUTDOWN_BUDGET: std::time::Duration = std::time::Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).await,
        None => Config::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    // No default plugins ship in this crate; the embedding deployment
    // registers its own platform plugins and loader binaries here.
    let conductor = match Conductor::new(config, Vec::new(), Arc::new(DashMap::new()), None) {
        Ok(conductor) => conductor,
        Err(err) => {
            error!(error = %err, "failed to initialize Conductor");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = conductor.run().await {
        error!(error = %err, "failed to start Conductor background tasks");
        return ExitCode::FAILURE;
    }
    info!("Conductor running");

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal, shutting down anyway");
    }
    info!("shutdown signal received");

    match tokio::time::timeout(SHUTDOWN_BUDGET, conductor.shutdown()).await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            error!(error = %err, "error during shutdown");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("shutdown did not complete within budget");
            ExitCode::from(124)
        }
    }
}
