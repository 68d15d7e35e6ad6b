//! Command handlers for the CLI
//!
//! Each handler wires configuration, authentication and the core pipeline
//! components together for one subcommand. Precedence for every setting is
//! CLI argument over config file over built-in default.

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::cache::CacheManager;
use crate::app::catalog::{self, Product};
use crate::app::decode::{DecodeConfig, DecodeStage, TimeStepOutcome};
use crate::app::models::{FetchOutcome, FetchReport};
use crate::app::pipeline::{FrameSink, Pipeline};
use crate::app::scheduler::Scheduler;
use crate::app::transfer::FtpConnector;
use crate::auth;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

use super::args::{
    AuthAction, AuthArgs, CacheAction, CacheArgs, FetchArgs, GlobalArgs, ProcessArgs, RunArgs,
};
use super::output::PngSink;
use super::progress::{ProgressConfig, ProgressDisplay};

/// Shared per-command setup: config plus an opened cache
struct CommandContext {
    config: AppConfig,
    cache: Arc<CacheManager>,
}

async fn build_context(global: &GlobalArgs) -> Result<CommandContext> {
    AppConfig::initialize_first_run().await?;
    let mut config = AppConfig::load(global.config.clone()).await?;

    if let Some(dir) = &global.cache_dir {
        config.cache.cache_root = Some(dir.clone());
    }

    let cache = Arc::new(CacheManager::new(config.cache.to_runtime_config()).await?);
    Ok(CommandContext { config, cache })
}

/// Product selection with CLI-over-config precedence
fn resolve_product(
    bands: &[u8],
    satellite: &Option<String>,
    config: &AppConfig,
) -> Product {
    let bands = if bands.is_empty() {
        config.product.bands.clone()
    } else {
        bands.to_vec()
    };
    let satellite = satellite
        .clone()
        .unwrap_or_else(|| config.product.satellite.clone());
    Product::new(&satellite, &bands)
}

/// Build a scheduler over an authenticated FTP connector
async fn build_scheduler(
    ctx: &CommandContext,
    workers_override: Option<usize>,
) -> Result<Scheduler> {
    let credentials = auth::ensure_authenticated().await?;
    let connector = FtpConnector::new(ctx.config.connection.to_runtime_config(), credentials);

    let mut scheduler_config = ctx.config.scheduler.to_runtime_config();
    if let Some(count) = workers_override {
        scheduler_config.worker_count = count;
    }

    let scheduler = Scheduler::new(
        scheduler_config,
        Arc::clone(&ctx.cache),
        Arc::new(connector),
    )?;

    // Ctrl-C drains the queue instead of killing half-written downloads
    let cancel = scheduler.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining granules");
            cancel.set();
        }
    });

    Ok(scheduler)
}

fn decode_config(config: &AppConfig, no_reproject: bool) -> DecodeConfig {
    let mut decode = config.decode.to_runtime_config();
    if no_reproject {
        decode.reproject = false;
    }
    decode
}

/// Handle the fetch command
pub async fn handle_fetch(args: FetchArgs, global: &GlobalArgs) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    let (start, end) = args.range.resolve().map_err(AppError::generic)?;

    let ctx = build_context(global).await?;
    let product = resolve_product(&args.bands, &args.satellite, &ctx.config);
    let interval = args
        .interval
        .unwrap_or(ctx.config.product.interval_minutes);

    let granules = catalog::expand(&product, start, end, interval)?;
    if args.dry_run {
        println!(
            "Would fetch {} granules ({} time steps x {} bands):",
            granules.len(),
            granules.len() / product.bands.len().max(1),
            product.bands.len()
        );
        for granule in &granules {
            println!("  {}", granule.remote_path());
        }
        return Ok(());
    }

    let scheduler = build_scheduler(&ctx, args.workers).await?;
    let progress = ProgressDisplay::start(
        granules.len(),
        ProgressConfig {
            quiet: global.quiet,
            show_granules: global.verbose,
        },
    );

    let outcome = scheduler
        .run_with_events(granules, Some(progress.sender()))
        .await;
    progress.finish().await;

    let summary = outcome.report.summary();
    println!("{}", summary);

    if let Some(reason) = outcome.fatal_error {
        return Err(AppError::generic(format!("Fetch aborted: {}", reason)));
    }
    Ok(())
}

/// Handle the run command: fetch plus decode plus emit
pub async fn handle_run(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    args.fetch.validate().map_err(AppError::generic)?;
    let (start, end) = args.fetch.range.resolve().map_err(AppError::generic)?;

    let ctx = build_context(global).await?;
    let product = resolve_product(&args.fetch.bands, &args.fetch.satellite, &ctx.config);
    let interval = args
        .fetch
        .interval
        .unwrap_or(ctx.config.product.interval_minutes);

    let scheduler = build_scheduler(&ctx, args.fetch.workers).await?;
    let decode = DecodeStage::new(
        decode_config(&ctx.config, args.no_reproject),
        Arc::clone(&ctx.cache),
    );
    let pipeline = Pipeline::new(product.clone(), interval, scheduler, decode);

    let output_root = args
        .output
        .unwrap_or_else(|| ctx.config.output.output_root.clone());
    let mut sink = PngSink::new(output_root);

    let total = catalog::expand(&product, start, end, interval)?.len();
    let progress = ProgressDisplay::start(
        total,
        ProgressConfig {
            quiet: global.quiet,
            show_granules: global.verbose,
        },
    );

    let summary = pipeline
        .run_with_events(start, end, &mut sink, Some(progress.sender()))
        .await?;
    progress.finish().await;

    println!("{}", summary.fetch);
    println!(
        "{} frames written, {} time steps skipped, {} failed",
        summary.frames, summary.skipped, summary.failed
    );

    if let Some(reason) = summary.fatal_error {
        return Err(AppError::generic(format!("Fetch aborted: {}", reason)));
    }
    Ok(())
}

/// Handle the process command: decode whatever the cache already holds
pub async fn handle_process(args: ProcessArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = build_context(global).await?;
    let product = resolve_product(&args.bands, &args.satellite, &ctx.config);

    let granules = catalog::scan_cache(ctx.cache.cache_root(), &product)?;
    if granules.is_empty() {
        println!("No cached granules found for {}", product.satellite);
        return Ok(());
    }
    info!("Processing {} cached granules", granules.len());

    // Everything scanned is by definition locally available
    let mut report = FetchReport::new();
    for granule in granules {
        report.record(granule, FetchOutcome::CachedHit);
    }

    let decode = DecodeStage::new(
        decode_config(&ctx.config, args.no_reproject),
        Arc::clone(&ctx.cache),
    );
    let output_root = args
        .output
        .unwrap_or_else(|| ctx.config.output.output_root.clone());
    let mut sink = PngSink::new(output_root);

    let mut skipped = 0usize;
    let mut failed = 0usize;
    for (timestamp, outcome) in decode.process(&report).await {
        match outcome {
            TimeStepOutcome::Frame(frame) => sink.emit(&frame)?,
            TimeStepOutcome::SkippedIncomplete { missing } => {
                warn!(%timestamp, ?missing, "time step skipped");
                skipped += 1;
            }
            TimeStepOutcome::Failed { error } => {
                warn!(%timestamp, error, "time step failed to decode");
                failed += 1;
            }
        }
    }

    println!(
        "{} frames written, {} time steps skipped, {} failed",
        sink.written(),
        skipped,
        failed
    );
    Ok(())
}

/// Handle authentication commands
pub async fn handle_auth(args: AuthArgs) -> Result<()> {
    match args.action {
        AuthAction::Setup => auth::setup_credentials().await?,
        AuthAction::Verify => {
            let valid = auth::verify_credentials().await?;
            if !valid {
                return Err(AppError::generic("Credential verification failed"));
            }
        }
        AuthAction::Status => auth::show_auth_status().await?,
        AuthAction::Clear => auth::clear_credentials()?,
    }
    Ok(())
}

/// Handle cache management commands
pub async fn handle_cache(args: CacheArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = build_context(global).await?;

    match args.action {
        CacheAction::Info => {
            let stats = ctx.cache.stats().await?;
            println!("Cache root:     {}", stats.cache_root.display());
            println!("Complete files: {}", stats.complete_files);
            println!("Total size:     {} bytes", stats.total_bytes);
            println!("Partial files:  {}", stats.partial_files);
        }
        CacheAction::Clean { all } => {
            if all {
                let root = ctx.cache.cache_root().to_path_buf();
                drop(ctx);
                tokio::fs::remove_dir_all(&root).await.map_err(|e| {
                    AppError::generic(format!(
                        "Failed to remove cache at {}: {}",
                        root.display(),
                        e
                    ))
                })?;
                println!("Removed cache at {}", root.display());
            } else {
                let removed = ctx.cache.clean_partials().await?;
                println!("Removed {} partial downloads", removed);
            }
        }
    }
    Ok(())
}
