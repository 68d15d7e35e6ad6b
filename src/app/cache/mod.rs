//! Local granule cache with atomic writes and a completeness index
//!
//! The cache mirrors the archive's date and hour partitioning on disk.
//! Transfers write into `.part` files and are promoted by rename only after
//! the byte count matches the remote-reported size, so interrupted runs can
//! resume without re-checking every file's content.

mod config;
mod index;
mod manager;

pub use config::CacheConfig;
pub use index::{CacheEntry, CacheIndex};
pub use manager::{CacheManager, CacheStats, CacheStatus};
