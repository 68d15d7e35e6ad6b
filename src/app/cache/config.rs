//! Cache configuration types and defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the granule cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for cache storage (OS-specific if None)
    pub cache_root: Option<PathBuf>,
    /// Re-hash cached files against their recorded checksum on hit
    pub verify_checksum: bool,
    /// Remove orphaned partial downloads on startup
    pub clean_partials: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: None, // Will use OS-specific cache directory
            verify_checksum: false,
            clean_partials: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with custom cache root
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            cache_root: Some(cache_root),
            ..Default::default()
        }
    }

    /// Enable or disable checksum verification on cache hits
    pub fn with_verify_checksum(mut self, enabled: bool) -> Self {
        self.verify_checksum = enabled;
        self
    }

    /// Enable or disable startup cleanup of partial downloads
    pub fn with_clean_partials(mut self, enabled: bool) -> Self {
        self.clean_partials = enabled;
        self
    }
}
