//! Configuration management for Himawari Fetcher
//!
//! Unified configuration with automatic first-run initialization,
//! multi-source loading, and zero-config defaults. TOML-friendly structs
//! mirror the runtime configs and convert explicitly, so serialization
//! concerns never leak into the pipeline types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::cache::CacheConfig;
use crate::app::catalog::Product;
use crate::app::decode::DecodeConfig;
use crate::app::scheduler::SchedulerConfig;
use crate::app::transfer::TransferConfig;
use crate::constants::{ftp, limits, product, workers};
use crate::errors::{AppError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Remote archive connection settings
    pub connection: ConnectionConfigToml,
    /// Satellite product selection
    pub product: ProductConfigToml,
    /// Acquisition scheduler settings
    pub scheduler: SchedulerConfigToml,
    /// Cache management settings
    pub cache: CacheConfigToml,
    /// Decode stage settings
    pub decode: DecodeConfigToml,
    /// Output emission settings
    pub output: OutputConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfigToml {
    /// Archive host name
    pub host: String,
    /// Control connection port
    pub port: u16,
    /// Connection establishment timeout in seconds
    pub connect_timeout_secs: u64,
    /// Per-file download timeout in seconds
    pub download_timeout_secs: u64,
}

impl Default for ConnectionConfigToml {
    fn default() -> Self {
        Self {
            host: ftp::DEFAULT_HOST.to_string(),
            port: ftp::DEFAULT_PORT,
            connect_timeout_secs: ftp::CONNECT_TIMEOUT.as_secs(),
            download_timeout_secs: ftp::DOWNLOAD_TIMEOUT.as_secs(),
        }
    }
}

impl ConnectionConfigToml {
    /// Convert to runtime TransferConfig
    pub fn to_runtime_config(&self) -> TransferConfig {
        TransferConfig {
            host: self.host.clone(),
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            download_timeout: Duration::from_secs(self.download_timeout_secs),
        }
    }
}

/// TOML-friendly product configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfigToml {
    /// Satellite identifier used in granule names
    pub satellite: String,
    /// Bands required per time step
    pub bands: Vec<u8>,
    /// Observation cadence in minutes
    pub interval_minutes: u32,
}

impl Default for ProductConfigToml {
    fn default() -> Self {
        Self {
            satellite: product::DEFAULT_SATELLITE.to_string(),
            bands: product::DEFAULT_BANDS.to_vec(),
            interval_minutes: product::DEFAULT_INTERVAL_MINUTES,
        }
    }
}

impl ProductConfigToml {
    /// Convert to a runtime Product
    pub fn to_product(&self) -> Product {
        Product::new(&self.satellite, &self.bands)
    }
}

/// TOML-friendly scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfigToml {
    /// Number of concurrent workers
    pub worker_count: usize,
    /// Maximum attempts per granule
    pub max_attempts: u32,
    /// Base delay between retries in milliseconds
    pub retry_base_delay_ms: u64,
    /// Maximum retry delay in seconds
    pub max_retry_delay_secs: u64,
    /// Backoff multiplier per attempt
    pub backoff_multiplier: f64,
    /// Jitter applied to retry delays (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for SchedulerConfigToml {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            max_attempts: limits::MAX_ATTEMPTS,
            retry_base_delay_ms: limits::RETRY_BASE_DELAY_MS,
            max_retry_delay_secs: limits::MAX_BACKOFF_SECS,
            backoff_multiplier: limits::BACKOFF_MULTIPLIER,
            jitter_factor: limits::BACKOFF_JITTER_FACTOR,
        }
    }
}

impl SchedulerConfigToml {
    /// Convert to runtime SchedulerConfig
    pub fn to_runtime_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            worker_count: self.worker_count,
            max_attempts: self.max_attempts,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_retry_delay: Duration::from_secs(self.max_retry_delay_secs),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfigToml {
    /// Cache directory path (leave empty to use system default)
    pub cache_root: Option<PathBuf>,
    /// Verify cached files against recorded checksums
    pub verify_checksum: bool,
    /// Remove stale partial downloads on startup
    pub clean_partials: bool,
}

impl Default for CacheConfigToml {
    fn default() -> Self {
        Self {
            cache_root: None,
            verify_checksum: false,
            clean_partials: true,
        }
    }
}

impl CacheConfigToml {
    /// Convert to runtime CacheConfig
    pub fn to_runtime_config(&self) -> CacheConfig {
        CacheConfig {
            cache_root: self.cache_root.clone(),
            verify_checksum: self.verify_checksum,
            clean_partials: self.clean_partials,
        }
    }
}

/// TOML-friendly decode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfigToml {
    /// Bundles decoded concurrently on the blocking pool
    pub pool_size: usize,
    /// Resample bands onto a regular lat/lon grid before compositing
    pub reproject: bool,
}

impl Default for DecodeConfigToml {
    fn default() -> Self {
        Self {
            pool_size: workers::DEFAULT_DECODE_POOL,
            reproject: true,
        }
    }
}

impl DecodeConfigToml {
    /// Convert to runtime DecodeConfig
    pub fn to_runtime_config(&self) -> DecodeConfig {
        DecodeConfig {
            pool_size: self.pool_size,
            reproject: self.reproject,
        }
    }
}

/// TOML-friendly output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigToml {
    /// Directory rendered frames are written into
    pub output_root: PathBuf,
}

impl Default for OutputConfigToml {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./frames"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::constants::logging::DEFAULT_LOG_LEVEL.to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. CLI arguments (applied by the caller)
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = if let Some(ref path) = config_file_override {
            Some(path.clone())
        } else {
            Self::find_config_file().await?
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(AppError::generic(format!(
                    "Specified config file not found: {}",
                    path.display()
                )));
            }
        }

        Ok(config)
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and notifies the user.
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        let config_path = Self::get_default_config_path()?;

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let config_content = Self::generate_default_config_content();
        tokio::fs::write(&config_path, config_content)
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    config_path.display(),
                    e
                ))
            })?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Find configuration file in standard locations
    async fn find_config_file() -> Result<Option<PathBuf>> {
        let search_paths = vec![
            // Project-local config
            PathBuf::from("./himawari-fetcher.toml"),
            PathBuf::from("./config.toml"),
            // User config
            Self::get_default_config_path()?,
            // System config (Unix only)
            #[cfg(unix)]
            PathBuf::from("/etc/himawari-fetcher/config.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Ok(Some(path));
            }
        }

        debug!("No config file found in standard locations");
        Ok(None)
    }

    /// Get the default config file path for the current user
    fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir.join("himawari-fetcher").join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            AppError::generic(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# Himawari Fetcher Configuration
# This file was automatically generated on first run.
# You can customize any of these settings to suit your needs.

[connection]
# Remote archive connection settings.
# The FTP password is never stored here; set {password_var}
# in the environment or a .env file, or run `himawari-fetcher auth setup`.
host = "{host}"
port = {port}
connect_timeout_secs = 30
download_timeout_secs = 600

[product]
# Which satellite and bands make up one complete time step
satellite = "{satellite}"
bands = {bands:?}
interval_minutes = {interval}

[scheduler]
# Acquisition concurrency and retry policy
worker_count = {worker_count}
max_attempts = {max_attempts}
retry_base_delay_ms = {retry_base_ms}
max_retry_delay_secs = {max_backoff}
backoff_multiplier = 2.0
jitter_factor = 0.1

[cache]
# Cache directory (leave commented to use system default)
# cache_root = "/path/to/custom/cache"
verify_checksum = false
clean_partials = true

[decode]
# Bundles decoded concurrently on the blocking pool
pool_size = {pool_size}
# Resample onto a regular lat/lon grid before compositing
reproject = true

[output]
# Directory rendered frames are written into
output_root = "./frames"

[logging]
level = "info"  # error, warn, info, debug, trace
colored_output = true
"#,
            password_var = crate::constants::env::PASSWORD,
            host = ftp::DEFAULT_HOST,
            port = ftp::DEFAULT_PORT,
            satellite = product::DEFAULT_SATELLITE,
            bands = product::DEFAULT_BANDS,
            interval = product::DEFAULT_INTERVAL_MINUTES,
            worker_count = workers::DEFAULT_WORKER_COUNT,
            max_attempts = limits::MAX_ATTEMPTS,
            retry_base_ms = limits::RETRY_BASE_DELAY_MS,
            max_backoff = limits::MAX_BACKOFF_SECS,
            pool_size = workers::DEFAULT_DECODE_POOL,
        )
    }
}
