//! Sidecar JSON index recording which cached granules are complete
//!
//! A file on disk is only trusted when the index carries a `complete` entry
//! for it. Files without an entry are treated as partial leftovers from an
//! interrupted run and re-downloaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::constants::files;
use crate::errors::{CacheError, CacheResult};

/// Index record for one cached granule file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File size in bytes at promote time
    pub size: u64,
    /// Whether the transfer finished and the file was promoted
    pub complete: bool,
    /// When the entry was last written or verified
    pub verified_at: DateTime<Utc>,
    /// MD5 of the file content, recorded when checksum verification is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl CacheEntry {
    pub fn complete(size: u64, md5: Option<String>) -> Self {
        Self {
            size,
            complete: true,
            verified_at: Utc::now(),
            md5,
        }
    }
}

/// On-disk index, one per cache root
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheIndex {
    /// Entries keyed by cache-relative path
    entries: HashMap<String, CacheEntry>,
}

impl CacheIndex {
    /// Load the index from a cache root, empty when absent
    ///
    /// # Errors
    ///
    /// `CacheError::IndexCorrupted` when the file exists but cannot be parsed.
    pub async fn load(cache_root: &Path) -> CacheResult<Self> {
        let path = Self::index_path(cache_root);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).await?;
        serde_json::from_str(&raw).map_err(|e| {
            warn!("Cache index unreadable, treating cache as cold: {}", e);
            CacheError::IndexCorrupted {
                reason: e.to_string(),
            }
        })
    }

    /// Persist the index atomically next to the cached files
    pub async fn save(&self, cache_root: &Path) -> CacheResult<()> {
        let path = Self::index_path(cache_root);
        let temp = path.with_extension(format!("json{}", files::TEMP_FILE_SUFFIX));

        let raw = serde_json::to_string_pretty(self).map_err(|e| CacheError::IndexCorrupted {
            reason: e.to_string(),
        })?;

        fs::write(&temp, raw.as_bytes()).await?;
        fs::rename(&temp, &path).await.map_err(|_| CacheError::PromoteFailed {
            temp_path: temp.clone(),
            final_path: path.clone(),
        })?;

        debug!("Saved cache index with {} entries", self.entries.len());
        Ok(())
    }

    fn index_path(cache_root: &Path) -> PathBuf {
        cache_root.join(files::CACHE_INDEX_FILE)
    }

    fn key(rel_path: &Path) -> String {
        rel_path.to_string_lossy().replace('\\', "/")
    }

    pub fn get(&self, rel_path: &Path) -> Option<&CacheEntry> {
        self.entries.get(&Self::key(rel_path))
    }

    pub fn insert(&mut self, rel_path: &Path, entry: CacheEntry) {
        self.entries.insert(Self::key(rel_path), entry);
    }

    pub fn remove(&mut self, rel_path: &Path) -> Option<CacheEntry> {
        self.entries.remove(&Self::key(rel_path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
