//! Himawari Fetcher Library
//!
//! A Rust library for acquiring Himawari full-disk satellite granules and
//! preprocessing them into rendered frames. Provides efficient, concurrent
//! downloading with resumable caching, retry handling, and an ordered
//! decode pipeline.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
