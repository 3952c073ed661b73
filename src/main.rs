//! # Plausible Stats
//!
//! Downloads the daily Plausible export archive for each configured site
//! (and each path prefix of a site), keeps the raw zip, and converts every
//! CSV table inside it to a JSON array of row objects.
//!
//! ## Usage
//!
//! ```sh
//! plausible_stats -c sites.yaml -o ./stats
//! ```
//!
//! ## Pipeline
//!
//! For each target, strictly one after another:
//! 1. **Fetch**: GET `<host>/<site>/export` for yesterday (UTC) and save the zip
//! 2. **Convert**: write `<archive>.<table>.json` for every CSV entry
//!
//! A failing target is logged and recorded; the rest still run. The process
//! exits non-zero if any target failed.

use std::error::Error;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod archive;
mod cli;
mod config;
mod errors;
mod fetcher;
mod models;
mod runner;
mod storage;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::StatsConfig;
use fetcher::{ExportEndpoint, HttpExportClient};
use models::TargetOutcome;
use runner::Pipeline;
use storage::FsStorage;
use utils::reference_date;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("plausible_stats starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match &args.config {
        Some(path) => StatsConfig::load(path).await?,
        None => StatsConfig::builtin()?,
    };
    if let Some(base_url) = &args.base_url {
        config.endpoint.base_url = base_url.clone();
    }
    config.restrict_to(&args.sites)?;

    let endpoint = ExportEndpoint::from_config(&config.endpoint)?;
    let client = HttpExportClient::new(&config.endpoint)?;
    let date = args.date.unwrap_or_else(|| reference_date(Utc::now()));
    let targets = config.targets();
    info!(
        %date,
        base_url = %config.endpoint.base_url,
        sites = config.sites.len(),
        targets = targets.len(),
        output_dir = %args.output_dir.display(),
        "Configuration loaded"
    );

    // ---- Fetch + convert ----
    let storage = FsStorage;
    let report = Pipeline::new(&client, &storage, &endpoint, &args.output_dir)
        .run(&targets, date)
        .await;

    for failure in report.failures() {
        match &failure.outcome {
            TargetOutcome::Rejected { status } => {
                error!(site = %failure.target, %status, "Target not exported")
            }
            TargetOutcome::Failed { reason } => {
                error!(site = %failure.target, %reason, "Target failed")
            }
            TargetOutcome::Converted { .. } => {}
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        succeeded = report.succeeded(),
        total = report.targets.len(),
        "Finished in {:.2} seconds",
        elapsed.as_secs_f64()
    );

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
