//! Apothecary application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing
//! 3. Construct the embedding provider and generative augmenter
//! 4. Run the requested subcommand: build the index, answer one query,
//!    describe a product, or serve the HTTP API

mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use apothecary_api::{start_server, AppState};
use apothecary_core::config::ApothecaryConfig;
use apothecary_core::query::validate_top_k;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so the configured level applies;
    // the outcome is logged once the subscriber is up.
    let config_path = args.resolve_config_path();
    let (mut config, missing_config) = if config_path.exists() {
        (ApothecaryConfig::load(&config_path)?, None)
    } else {
        (ApothecaryConfig::default(), Some(config_path.clone()))
    };
    args.apply_overrides(&mut config);
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Apothecary v{}", env!("CARGO_PKG_VERSION"));
    match missing_config {
        None => tracing::info!(path = %config_path.display(), "Configuration loaded"),
        Some(path) => {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults")
        }
    }

    let embedder = commands::build_embedder(&config)?;

    match args.command {
        Command::BuildIndex { .. } => {
            let info = commands::build_index(&config, embedder).await?;
            tracing::info!(
                products = info.products,
                dimension = info.dimension,
                index = %config.paths.index.display(),
                metadata = %config.paths.metadata.display(),
                "Index build complete"
            );
        }
        Command::Recommend {
            query,
            top_k,
            augment,
        } => {
            let augmenter = commands::build_augmenter(&config)?;
            let orchestrator = commands::open_orchestrator(&config, embedder, augmenter)?;
            let k = validate_top_k(top_k.unwrap_or(config.retrieval.default_top_k as i64))?;

            let output = if augment {
                serde_json::to_string_pretty(&orchestrator.recommend_augmented(&query, k).await?)?
            } else {
                serde_json::to_string_pretty(&orchestrator.recommend(&query, k).await?)?
            };
            println!("{}", output);
        }
        Command::Describe { id } => {
            let augmenter = commands::build_augmenter(&config)?;
            let orchestrator = commands::open_orchestrator(&config, embedder, augmenter)?;
            let described = orchestrator.describe_product(id).await?;
            println!("{}", serde_json::to_string_pretty(&described)?);
        }
        Command::Serve { .. } => {
            let augmenter = commands::build_augmenter(&config)?;
            let orchestrator = commands::open_orchestrator(&config, embedder, augmenter)?;
            let state = AppState::new(Arc::new(orchestrator), config);

            if let Err(e) = start_server(state, shutdown_signal()).await {
                tracing::error!(error = %e, "API server failed; is another instance running?");
                return Err(e.into());
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
