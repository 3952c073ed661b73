//! Command-line interface definitions.
//!
//! Every option has an environment-variable fallback so the binary can be
//! driven by a cron job or CI schedule without a wrapper script.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

/// Fetch yesterday's Plausible export for each configured site and convert
/// the CSV tables inside to JSON.
///
/// # Examples
///
/// ```sh
/// # Built-in site list, output under ./stats
/// plausible_stats
///
/// # Custom site list and output directory
/// plausible_stats -c sites.yaml -o /srv/stats
///
/// # One site, explicit day
/// plausible_stats --site peps.python.org --date 2025-05-05
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Site configuration YAML (defaults to the built-in site list)
    #[arg(short, long, env = "STATS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory for archives and converted JSON
    #[arg(short, long, env = "STATS_OUTPUT_DIR", default_value = "stats")]
    pub output_dir: PathBuf,

    /// Day to export as YYYY-MM-DD (defaults to yesterday in UTC)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Override the analytics host from the configuration
    #[arg(long, env = "STATS_BASE_URL")]
    pub base_url: Option<String>,

    /// Only export these site identifiers (repeatable)
    #[arg(long = "site")]
    pub sites: Vec<String>,
}
