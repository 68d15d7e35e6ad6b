//! Command-line argument parsing for Himawari Fetcher
//!
//! Defines the CLI structure using clap derive macros: granule fetching,
//! offline decoding, the combined pipeline run, plus authentication and
//! cache management.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::constants::workers;

/// Himawari Fetcher - acquire and preprocess satellite imagery
#[derive(Parser, Debug)]
#[command(
    name = "himawari_fetcher",
    version,
    about = "Fetch Himawari full-disk granules and render them into frames",
    long_about = "An unattended acquisition pipeline for Himawari standard-format granules.
Expands a time range into the granules it implies, downloads them over FTP with
bounded concurrency and retries, caches them locally, and decodes complete time
steps into rendered frames."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch granules for a time range into the cache
    Fetch(FetchArgs),

    /// Decode already-cached granules into frames
    Process(ProcessArgs),

    /// Fetch and decode in one go
    Run(RunArgs),

    /// Manage authentication credentials
    Auth(AuthArgs),

    /// Cache management and statistics
    Cache(CacheArgs),
}

/// A half-open UTC time range shared by fetching commands
#[derive(Args, Debug, Clone)]
pub struct TimeRangeArgs {
    /// Start of the range (UTC), e.g. 2025-03-10T00:00
    #[arg(long, value_name = "TIME")]
    pub start: String,

    /// End of the range (UTC, exclusive), e.g. 2025-03-10T06:00
    #[arg(long, value_name = "TIME")]
    pub end: String,
}

impl TimeRangeArgs {
    /// Parse both endpoints, accepting RFC 3339 or `YYYY-MM-DDTHH:MM`
    pub fn resolve(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        Ok((parse_time(&self.start)?, parse_time(&self.end)?))
    }
}

fn parse_time(input: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!(
        "Cannot parse '{}' as a UTC time (expected e.g. 2025-03-10T00:00)",
        input
    ))
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Time range to fetch
    #[command(flatten)]
    pub range: TimeRangeArgs,

    /// Bands to fetch, comma separated (default: the operational set)
    #[arg(short, long, value_delimiter = ',')]
    pub bands: Vec<u8>,

    /// Observation cadence in minutes
    #[arg(short, long)]
    pub interval: Option<u32>,

    /// Number of concurrent download workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Satellite identifier in granule names
    #[arg(long)]
    pub satellite: Option<String>,

    /// Show what would be fetched without connecting
    #[arg(long)]
    pub dry_run: bool,
}

impl FetchArgs {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(count) = self.workers {
            if count == 0 || count > workers::MAX_WORKER_COUNT {
                return Err(format!(
                    "Number of workers must be between 1 and {}",
                    workers::MAX_WORKER_COUNT
                ));
            }
        }
        if self.interval == Some(0) {
            return Err("Interval must be greater than 0 minutes".to_string());
        }
        if let Some(band) = self.bands.iter().find(|b| **b == 0 || **b > 16) {
            return Err(format!("Band {} is outside the instrument range 1-16", band));
        }
        Ok(())
    }
}

/// Arguments for the process command
#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Bands making up one time step, comma separated
    #[arg(short, long, value_delimiter = ',')]
    pub bands: Vec<u8>,

    /// Satellite identifier in granule names
    #[arg(long)]
    pub satellite: Option<String>,

    /// Directory rendered frames are written into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Skip reprojection and render on the native scan grid
    #[arg(long)]
    pub no_reproject: bool,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Fetch options
    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Directory rendered frames are written into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Skip reprojection and render on the native scan grid
    #[arg(long)]
    pub no_reproject: bool,
}

/// Arguments for authentication management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Authentication actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Set up archive FTP credentials
    Setup,

    /// Verify current credentials against the archive
    Verify,

    /// Show authentication status
    Status,

    /// Remove stored credentials from the .env file
    Clear,
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache statistics
    Info,

    /// Clean up partial downloads
    Clean {
        /// Remove every cached granule, not just partials
        #[arg(long)]
        all: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}
