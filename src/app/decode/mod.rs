//! Granule decoding, reprojection and frame composition
//!
//! The decode path runs in three layers:
//!
//! - [`hsd`] unpacks a bzip2-compressed granule into calibrated pixels and
//!   a geostationary navigation record
//! - [`transform`] resamples bands onto a regular lat/lon grid and composes
//!   a time step's bands into one displayable frame
//! - [`stage`] drives both over a bounded blocking pool and emits finished
//!   time steps in strict timestamp order
//!
//! ## Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use himawari_fetcher::app::cache::{CacheConfig, CacheManager};
//! use himawari_fetcher::app::decode::{DecodeConfig, DecodeStage, TimeStepOutcome};
//! # use himawari_fetcher::app::models::FetchReport;
//!
//! # async fn example(report: FetchReport) -> anyhow::Result<()> {
//! let cache = Arc::new(CacheManager::new(CacheConfig::default()).await?);
//! let stage = DecodeStage::new(DecodeConfig::default(), cache);
//!
//! for (timestamp, outcome) in stage.process(&report).await {
//!     match outcome {
//!         TimeStepOutcome::Frame(frame) => println!("{}: {}", timestamp, frame.label),
//!         TimeStepOutcome::SkippedIncomplete { missing } => {
//!             println!("{}: missing bands {:?}", timestamp, missing)
//!         }
//!         TimeStepOutcome::Failed { error } => println!("{}: {}", timestamp, error),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod grid;
pub mod hsd;
pub mod stage;
pub mod transform;

#[cfg(test)]
mod tests;

pub use grid::{GeosProjection, Grid};
pub use hsd::{decode_file, DecodedBand};
pub use stage::{DecodeConfig, DecodeStage, TimeStepOutcome};
pub use transform::{compose_frame, reproject_to_geographic, DecodedFrame, FramePixels};
