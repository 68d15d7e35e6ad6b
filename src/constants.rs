//! Application constants for Himawari Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for authentication
pub mod env {
    /// Environment variable name for the FTP username
    pub const USERNAME: &str = "HIMAWARI_FTP_USER";

    /// Environment variable name for the FTP password
    pub const PASSWORD: &str = "HIMAWARI_FTP_PASSWORD";
}

/// Authentication and credential-related constants
pub mod auth {
    /// Minimum allowed username length
    pub const MIN_USERNAME_LENGTH: usize = 3;

    /// Maximum allowed username length
    pub const MAX_USERNAME_LENGTH: usize = 64;

    /// File permissions for .env file (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const ENV_FILE_PERMISSIONS: u32 = 0o600;
}

/// FTP archive endpoint constants
pub mod ftp {
    use super::Duration;

    /// Default archive host
    pub const DEFAULT_HOST: &str = "ftp.ptree.jaxa.jp";

    /// Default HimawariCloud FTP control port
    pub const DEFAULT_PORT: u16 = 2051;

    /// Root of the date-partitioned HSD archive tree
    pub const ARCHIVE_ROOT: &str = "/jma/hsd";

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Per-file download timeout
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
}

/// Retry and backoff configuration
pub mod limits {
    /// Maximum download attempts per granule
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Maximum backoff delay (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 120;

    /// Backoff multiplier between attempts
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Jitter factor for randomizing delays (0.0-1.0)
    pub const BACKOFF_JITTER_FACTOR: f64 = 0.1;
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic downloads
    pub const TEMP_FILE_SUFFIX: &str = ".part";

    /// Sidecar cache index file name
    pub const CACHE_INDEX_FILE: &str = ".granule_index.json";

    /// Compressed granule extension
    pub const GRANULE_EXTENSION: &str = ".DAT.bz2";
}

/// Worker and concurrency configuration
pub mod workers {
    use super::Duration;

    /// Default number of transfer workers (conservative, the archive caps
    /// concurrent connections per account)
    pub const DEFAULT_WORKER_COUNT: usize = 4;

    /// Maximum recommended concurrent workers
    pub const MAX_WORKER_COUNT: usize = 8;

    /// Channel buffer size for result collection
    pub const CHANNEL_BUFFER_SIZE: usize = 100;

    /// Default bounded decode pool size
    pub const DEFAULT_DECODE_POOL: usize = 2;

    /// Timeout for worker shutdown during cancellation
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Product and band constants
pub mod product {
    /// Default satellite identifier in granule names
    pub const DEFAULT_SATELLITE: &str = "H09";

    /// Full-disk observation area code
    pub const FULL_DISK: &str = "FLDK";

    /// Default observation interval in minutes
    pub const DEFAULT_INTERVAL_MINUTES: u32 = 10;

    /// Default band selection, matching the operational target set
    pub const DEFAULT_BANDS: &[u8] = &[1, 2, 3, 4, 7, 8, 13];

    /// Bands required for a true-color composite
    pub const TRUE_COLOR_BANDS: &[u8] = &[3, 2, 1];

    /// Infrared band used for the grayscale/night fallback composite
    pub const IR_BAND: u8 = 13;
}

/// HSD granule format constants
pub mod hsd {
    /// Basic information block id
    pub const BLOCK_BASIC: u8 = 1;

    /// Data information block id
    pub const BLOCK_DATA: u8 = 2;

    /// Projection information block id
    pub const BLOCK_PROJECTION: u8 = 3;

    /// Calibration information block id
    pub const BLOCK_CALIBRATION: u8 = 5;

    /// End-of-header marker block id
    pub const BLOCK_END: u8 = 11;

    /// Count value marking an erroneous pixel
    pub const ERROR_COUNT: u16 = 0xFFFF;

    /// Count value marking a pixel outside the scan area
    pub const OUTSIDE_COUNT: u16 = 0xFFFE;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use env::{PASSWORD as ENV_PASSWORD, USERNAME as ENV_USERNAME};
pub use files::{CACHE_INDEX_FILE, TEMP_FILE_SUFFIX};
pub use ftp::{ARCHIVE_ROOT, DEFAULT_PORT};
pub use limits::{MAX_ATTEMPTS, RETRY_BASE_DELAY_MS};
pub use workers::DEFAULT_WORKER_COUNT;
