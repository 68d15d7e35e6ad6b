//! Core acquisition and preprocessing pipeline
//!
//! The modules below follow the data's path through the system:
//!
//! - [`catalog`] turns a time range into the granule references it implies
//! - [`transfer`] speaks FTP to the remote archive behind a transport trait
//! - [`cache`] owns the local granule store with atomic promotion
//! - [`scheduler`] fetches granules with bounded concurrency and retries
//! - [`decode`] unpacks, reprojects and composes granules into frames
//! - [`pipeline`] wires the stages together behind one entry point

pub mod cache;
pub mod catalog;
pub mod decode;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod transfer;

pub use catalog::Product;
pub use models::{FetchOutcome, FetchReport, FetchSummary, GranuleRef, TimeStepBundle};
pub use pipeline::{FrameSink, Pipeline, PipelineSummary, VecSink};
pub use scheduler::{CancelFlag, FetchEvent, RunOutcome, Scheduler, SchedulerConfig};
