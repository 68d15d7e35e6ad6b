//! Himawari Fetcher CLI application
//!
//! Command-line interface for fetching Himawari full-disk granules and
//! rendering them into frames. Features concurrent downloads, resumable
//! caching, progress tracking, and comprehensive error handling.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use himawari_fetcher::cli::{
    handle_auth, handle_cache, handle_fetch, handle_process, handle_run, Cli, Commands,
};
use himawari_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    init_logging(&cli);

    info!("Himawari Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, &cli.global).await
        }
        Commands::Process(args) => {
            info!("Executing process command");
            handle_process(args, &cli.global).await
        }
        Commands::Run(args) => {
            info!("Executing run command");
            handle_run(args, &cli.global).await
        }
        Commands::Auth(args) => {
            info!("Executing auth command");
            handle_auth(args).await
        }
        Commands::Cache(args) => {
            info!("Executing cache command");
            handle_cache(args, &cli.global).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("himawari_fetcher={}", log_level).parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
