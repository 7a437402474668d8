//! wsi-tiler - Build a labeled tile dataset from whole-slide images.
//!
//! This binary parses the configuration, sets up logging and runs the batch.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_tiler::{config::Config, pipeline::run_batch};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = config.pipeline_options();

    info!("Configuration:");
    info!("  Slides: {}/{}", options.wsi_dir.display(), options.pattern);
    info!("  Output: {}", options.out_dir.display());
    if let Some(ref labels) = options.labels_csv {
        info!("  Labels: {}", labels.display());
    }
    info!(
        "  Tiles: {}px, {} acceptance, {} worker(s)",
        options.scan.tile_px,
        options.scan.policy.name(),
        options.scan.workers
    );

    match run_batch(&options).await {
        Ok(summary) => {
            if !summary.failures.is_empty() {
                error!("{} slide(s) failed", summary.failures.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_tiler=debug"
    } else {
        "wsi_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
