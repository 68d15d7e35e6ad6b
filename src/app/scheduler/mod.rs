//! Acquisition scheduling with bounded concurrency and retry
//!
//! The scheduler turns a list of [`GranuleRef`](crate::app::models::GranuleRef)s
//! into a [`FetchReport`](crate::app::models::FetchReport) with one terminal
//! outcome per granule. Key behaviors:
//!
//! - **Session per worker**: each worker holds at most one archive session,
//!   so concurrency is bounded by `worker_count`
//! - **Cache first**: a valid cached granule produces `CachedHit` without
//!   touching the network
//! - **Retry with backoff**: transient transfer failures are retried up to
//!   `max_attempts` times with exponential, jittered delays
//! - **Fail fast on session errors**: a connect or login failure aborts the
//!   run; undispatched granules are reported as `NotAttempted`
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use himawari_fetcher::app::cache::{CacheConfig, CacheManager};
//! use himawari_fetcher::app::scheduler::{Scheduler, SchedulerConfig};
//! use himawari_fetcher::app::transfer::{FtpConnector, TransferConfig};
//! use himawari_fetcher::auth::FtpCredentials;
//!
//! # async fn example(granules: Vec<himawari_fetcher::app::models::GranuleRef>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(CacheManager::new(CacheConfig::default()).await?);
//! let connector = Arc::new(FtpConnector::new(
//!     TransferConfig::default(),
//!     FtpCredentials::from_env()?,
//! ));
//! let scheduler = Scheduler::new(SchedulerConfig::default(), cache, connector)?;
//! let outcome = scheduler.run(granules).await;
//! println!("{}", outcome.report.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod retry;

#[cfg(test)]
mod tests;

// Re-export main public API
pub use config::SchedulerConfig;
pub use core::{CancelFlag, FetchEvent, RunOutcome, Scheduler};
pub use retry::RetryPolicy;
