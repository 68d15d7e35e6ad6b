//! Cache manager with atomic promote and resumable-run semantics
//!
//! Downloads land in `.part` temporary files and only become visible under
//! their final names after the byte count matches the remote-reported size.
//! The sidecar index is the source of truth for completeness, so a crashed
//! run never leaves a half-written file that a later run would trust.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::app::models::GranuleRef;
use crate::constants::files;
use crate::errors::{CacheError, CacheResult};

use super::config::CacheConfig;
use super::index::{CacheEntry, CacheIndex};

/// Result of a cache lookup for one granule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Complete file present, no transfer needed
    Hit,
    /// A file exists but is incomplete or does not match the remote size
    Stale,
    /// Nothing cached for this granule
    Miss,
}

/// Aggregate cache statistics for status reporting
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub cache_root: PathBuf,
    pub complete_files: usize,
    pub total_bytes: u64,
    pub partial_files: usize,
}

/// Main cache management system
#[derive(Debug)]
pub struct CacheManager {
    config: CacheConfig,
    cache_root: PathBuf,
    index: RwLock<CacheIndex>,
}

impl CacheManager {
    /// Open (or create) a cache rooted at the configured directory
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache directory cannot be created or the
    /// index file exists but cannot be parsed.
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let cache_root = match &config.cache_root {
            Some(path) => path.clone(),
            None => Self::get_default_cache_dir()?,
        };

        Self::ensure_directory_exists(&cache_root).await?;

        let index = match CacheIndex::load(&cache_root).await {
            Ok(index) => index,
            Err(CacheError::IndexCorrupted { reason }) => {
                // A bad index only costs re-downloads, never bad data
                warn!("Rebuilding cache index from scratch: {}", reason);
                CacheIndex::default()
            }
            Err(e) => return Err(e),
        };

        let manager = Self {
            config,
            cache_root,
            index: RwLock::new(index),
        };

        if manager.config.clean_partials {
            let removed = manager.clean_partials().await?;
            if removed > 0 {
                info!("Removed {} orphaned partial downloads", removed);
            }
        }

        info!(
            "Initialized granule cache at {}",
            manager.cache_root.display()
        );
        Ok(manager)
    }

    /// Get the cache root directory
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Default cache directory for the current OS
    ///
    /// Kept next to the configuration file:
    /// - macOS: ~/Library/Application Support/himawari-fetcher/cache
    /// - Linux: ~/.config/himawari-fetcher/cache
    /// - Windows: %APPDATA%/himawari-fetcher/cache
    fn get_default_cache_dir() -> CacheResult<PathBuf> {
        let cache_dir = dirs::config_dir()
            .ok_or_else(|| CacheError::DirectoryNotAccessible {
                path: PathBuf::from("system config directory"),
            })?
            .join("himawari-fetcher")
            .join("cache");

        Ok(cache_dir)
    }

    async fn ensure_directory_exists(path: &Path) -> CacheResult<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .await
                .map_err(|_| CacheError::DirectoryNotAccessible {
                    path: path.to_path_buf(),
                })?;
            debug!("Created cache directory: {}", path.display());
        }
        Ok(())
    }

    /// Final on-disk path for a granule
    pub fn file_path(&self, granule: &GranuleRef) -> PathBuf {
        granule.local_path(&self.cache_root)
    }

    /// Temporary path a transfer writes into before promotion
    pub fn temp_path(&self, granule: &GranuleRef) -> PathBuf {
        let final_path = self.file_path(granule);
        let mut name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(files::TEMP_FILE_SUFFIX);
        final_path.with_file_name(name)
    }

    /// Check whether a granule is already complete in the cache
    ///
    /// `remote_size` is the size the archive reports for the granule, when a
    /// listing is available. A cached file whose size disagrees with it is
    /// stale and will be re-fetched.
    pub async fn check(
        &self,
        granule: &GranuleRef,
        remote_size: Option<u64>,
    ) -> CacheResult<CacheStatus> {
        let path = self.file_path(granule);
        if !path.exists() {
            return Ok(CacheStatus::Miss);
        }

        let entry = {
            let index = self.index.read().await;
            index.get(granule.local_rel_path()).cloned()
        };

        let entry = match entry {
            Some(entry) if entry.complete => entry,
            // File on disk but never promoted: a crashed run left it behind
            _ => return Ok(CacheStatus::Stale),
        };

        let actual = fs::metadata(&path).await?.len();
        if actual != entry.size {
            warn!(
                "Cached file size changed since promotion: {} ({} != {})",
                path.display(),
                actual,
                entry.size
            );
            return Ok(CacheStatus::Stale);
        }

        if let Some(expected) = remote_size {
            if actual != expected {
                debug!(
                    "Cached file does not match remote size: {} ({} != {})",
                    path.display(),
                    actual,
                    expected
                );
                return Ok(CacheStatus::Stale);
            }
        }

        if self.config.verify_checksum {
            if let Some(recorded) = &entry.md5 {
                let actual_md5 = Self::compute_md5(&path).await?;
                if &actual_md5 != recorded {
                    warn!("Cached file failed checksum: {}", path.display());
                    return Ok(CacheStatus::Stale);
                }
            }
        }

        Ok(CacheStatus::Hit)
    }

    /// Remove a stale file and its index entry before re-downloading
    pub async fn evict(&self, granule: &GranuleRef) -> CacheResult<()> {
        let path = self.file_path(granule);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        let mut index = self.index.write().await;
        index.remove(granule.local_rel_path());
        index.save(&self.cache_root).await?;
        Ok(())
    }

    /// Prepare the directory for a transfer and return the temp path
    pub async fn begin_download(&self, granule: &GranuleRef) -> CacheResult<PathBuf> {
        let final_path = self.file_path(granule);
        if let Some(parent) = final_path.parent() {
            Self::ensure_directory_exists(parent).await?;
        }
        Ok(self.temp_path(granule))
    }

    /// Promote a finished download to its final name
    ///
    /// Verifies the byte count against `expected_size` before the rename, so
    /// a truncated transfer never becomes visible under the final name.
    ///
    /// # Errors
    ///
    /// `CacheError::SizeMismatch` when the temp file is short or long;
    /// `CacheError::PromoteFailed` when the rename itself fails.
    pub async fn promote(
        &self,
        granule: &GranuleRef,
        temp_path: &Path,
        expected_size: u64,
    ) -> CacheResult<()> {
        let actual = fs::metadata(temp_path).await?.len();
        if actual != expected_size {
            let _ = fs::remove_file(temp_path).await;
            return Err(CacheError::SizeMismatch {
                path: temp_path.to_path_buf(),
                expected: expected_size,
                actual,
            });
        }

        let md5 = if self.config.verify_checksum {
            Some(Self::compute_md5(temp_path).await?)
        } else {
            None
        };

        let final_path = self.file_path(granule);
        fs::rename(temp_path, &final_path)
            .await
            .map_err(|_| CacheError::PromoteFailed {
                temp_path: temp_path.to_path_buf(),
                final_path: final_path.clone(),
            })?;

        let mut index = self.index.write().await;
        index.insert(
            granule.local_rel_path(),
            CacheEntry::complete(expected_size, md5),
        );
        index.save(&self.cache_root).await?;

        debug!("Promoted {}", final_path.display());
        Ok(())
    }

    /// Abandon a failed transfer, removing its temp file
    pub async fn discard(&self, temp_path: &Path) {
        if temp_path.exists() {
            if let Err(e) = fs::remove_file(temp_path).await {
                warn!("Could not remove partial file {}: {}", temp_path.display(), e);
            }
        }
    }

    async fn compute_md5(path: &Path) -> CacheResult<String> {
        let content = fs::read(path).await?;
        Ok(format!("{:x}", md5::compute(&content)))
    }

    /// Remove every `.part` file under the cache root
    pub async fn clean_partials(&self) -> CacheResult<usize> {
        let mut removed = 0;
        let mut stack = vec![self.cache_root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if path
                    .file_name()
                    .map(|n| n.to_string_lossy().ends_with(files::TEMP_FILE_SUFFIX))
                    .unwrap_or(false)
                {
                    fs::remove_file(&path).await?;
                    debug!("Removed partial download: {}", path.display());
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    /// Scan the cache tree for status reporting
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let mut complete_files = 0;
        let mut total_bytes = 0u64;
        let mut partial_files = 0;
        let mut stack = vec![self.cache_root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                let Some(name) = name else { continue };
                if name.ends_with(files::TEMP_FILE_SUFFIX) {
                    partial_files += 1;
                } else if name.ends_with(files::GRANULE_EXTENSION) {
                    complete_files += 1;
                    total_bytes += entry.metadata().await?.len();
                }
            }
        }

        Ok(CacheStats {
            cache_root: self.cache_root.clone(),
            complete_files,
            total_bytes,
            partial_files,
        })
    }
}
