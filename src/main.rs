mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use taskrelay::config::Config;
use taskrelay::engine::EngineClient;
use taskrelay::handlers::{HttpHandlerOptions, HttpTaskHandler, TaskHandler};
use taskrelay::worker::WorkerEngine;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args.config).await?,
    }

    Ok(())
}

async fn run(
    config_path: Option<std::path::PathBuf>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let engine = EngineClient::new(&config.engine)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = Vec::with_capacity(config.workers.len());
    for worker_config in config.workers {
        let handler: Arc<dyn TaskHandler> = Arc::new(HttpTaskHandler::new(
            HttpHandlerOptions::from_worker(&worker_config),
        )?);
        let worker = WorkerEngine::new(
            engine.clone(),
            handler,
            worker_config,
            shutdown_rx.clone(),
        )?;
        workers.push(tokio::spawn(worker.run()));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining workers");
    let _ = shutdown_tx.send(true);

    for worker in workers {
        let _ = worker.await;
    }

    Ok(())
}
