//! Prelude module for Himawari Fetcher Library
//!
//! Re-exports the most commonly used items from the library, providing a
//! convenient way to import everything needed for typical usage with a
//! single `use himawari_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use himawari_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let cache = Arc::new(CacheManager::new(CacheConfig::default()).await?);
//!     let credentials = FtpCredentials::from_env()?;
//!     let connector = Arc::new(FtpConnector::new(TransferConfig::default(), credentials));
//!     let scheduler = Scheduler::new(SchedulerConfig::default(), cache, connector)?;
//!
//!     // Continue with acquisition setup...
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential pipeline components
pub use crate::app::{
    cache::{CacheConfig, CacheManager, CacheStats},
    catalog::{expand, Product},
    decode::{DecodeConfig, DecodeStage, DecodedFrame, TimeStepOutcome},
    pipeline::{FrameSink, Pipeline, PipelineSummary, VecSink},
    scheduler::{CancelFlag, FetchEvent, RunOutcome, Scheduler, SchedulerConfig},
    transfer::{Connector, FtpConnector, TransferConfig, Transport},
    FetchOutcome, FetchReport, FetchSummary, GranuleRef, TimeStepBundle,
};

// Authentication
pub use crate::auth::{
    check_credentials, ensure_authenticated, get_auth_status, AuthStatus, FtpCredentials,
};

// Commonly used constants
pub use crate::constants::{
    ARCHIVE_ROOT, DEFAULT_PORT, DEFAULT_WORKER_COUNT, ENV_PASSWORD, ENV_USERNAME,
};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
