//! Error types for Himawari Fetcher
//!
//! This module defines the error taxonomy for all components of the pipeline.
//! Session-level failures (connect/auth) are fatal to a run; per-granule and
//! per-timestamp failures are collected into the final report instead of being
//! raised individually.

use std::path::PathBuf;
use thiserror::Error;

/// Authentication and credential storage errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing environment variables for credentials
    #[error(
        "Missing FTP credentials. Set HIMAWARI_FTP_USER and HIMAWARI_FTP_PASSWORD environment variables or run 'auth setup'"
    )]
    MissingCredentials,

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Invalid username format
    #[error("Invalid username format: {reason}")]
    InvalidUsername { reason: String },

    /// File I/O error during credential storage
    #[error("Failed to save credentials to file")]
    CredentialStorage(#[from] std::io::Error),

    /// Permission error on credential file
    #[error("Permission denied accessing credential file: {path}")]
    PermissionDenied { path: PathBuf },
}

/// Remote transfer errors
///
/// `Connect` and `Auth` are session-level and fatal to the whole run.
/// `RemoteNotFound` is permanent for the affected granule and is never
/// retried. `Interrupted`, `Protocol` and `Io` are per-attempt and retryable.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Could not establish a connection to the archive
    #[error("Could not connect to FTP server {host}: {reason}")]
    Connect { host: String, reason: String },

    /// Login rejected
    #[error("FTP login failed for user '{user}'. Please check your credentials")]
    Auth { user: String },

    /// Remote directory or file does not exist
    #[error("Remote path not found: {path}")]
    RemoteNotFound { path: String },

    /// Transfer was interrupted mid-stream
    #[error("Transfer interrupted for {path}: received {received} of {expected} bytes")]
    Interrupted {
        path: String,
        received: u64,
        expected: u64,
    },

    /// Underlying protocol error during a transfer
    #[error("FTP protocol error: {0}")]
    Protocol(String),

    /// Local I/O error while writing the temporary file
    #[error("File I/O error during transfer")]
    Io(#[from] std::io::Error),

    /// Session was closed while still in use
    #[error("FTP session closed unexpectedly")]
    SessionClosed,
}

impl TransferError {
    /// Session-level errors abort the whole run instead of failing one granule
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransferError::Connect { .. } | TransferError::Auth { .. }
        )
    }

    /// Permanent per-granule errors are not retried
    pub fn is_permanent(&self) -> bool {
        matches!(self, TransferError::RemoteNotFound { .. })
    }
}

/// Granule catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Requested time range is inverted, or the interval is invalid
    #[error("Invalid time range: {reason}")]
    InvalidRange { reason: String },

    /// A filename did not match the granule naming convention
    #[error("Not a valid granule filename: {name}")]
    InvalidFilename { name: String },

    /// Unknown product identifier
    #[error("Unknown product: {product}")]
    UnknownProduct { product: String },
}

/// Cache management errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory not found or inaccessible
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// Cache index corruption
    #[error("Cache index corrupted: {reason}")]
    IndexCorrupted { reason: String },

    /// Downloaded byte count does not match the remote-reported size
    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Recorded checksum does not match file content
    #[error("Checksum mismatch for {path}")]
    ChecksumMismatch { path: PathBuf },

    /// Atomic promote from temp path to final path failed
    #[error("Atomic promote failed: could not rename {temp_path} to {final_path}")]
    PromoteFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// I/O error on the cache tree
    #[error("Cache I/O error")]
    Io(#[from] std::io::Error),
}

/// Granule decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    /// File missing or unreadable
    #[error("Granule file unreadable: {path}")]
    Unreadable { path: PathBuf },

    /// bzip2 payload could not be decompressed
    #[error("Granule decompression failed for {path}: {reason}")]
    Decompression { path: PathBuf, reason: String },

    /// Header structure invalid (bad block id, short block, bad magic)
    #[error("Invalid granule header: {reason}")]
    InvalidHeader { reason: String },

    /// Pixel payload shorter than the declared grid
    #[error("Truncated pixel data: expected {expected} samples, found {found}")]
    TruncatedData { expected: usize, found: usize },

    /// Header metadata disagrees with the requested granule
    #[error("Granule metadata mismatch: {reason}")]
    MetadataMismatch { reason: String },

    /// I/O error while reading the granule
    #[error("I/O error reading granule")]
    Io(#[from] std::io::Error),
}

/// Transform stage errors
#[derive(Error, Debug)]
pub enum TransformError {
    /// A requested band is not present in the decoded bundle
    #[error("Band {band:02} not present in decoded bundle")]
    MissingBand { band: u8 },

    /// Grids within one bundle have incompatible shapes
    #[error("Grid shape mismatch: {reason}")]
    ShapeMismatch { reason: String },

    /// Target grid specification is degenerate
    #[error("Invalid target grid: {reason}")]
    InvalidTargetGrid { reason: String },

    /// Compositing recipe cannot be satisfied
    #[error("Composite failed: {reason}")]
    CompositeFailed { reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// I/O error reading or writing configuration
    #[error("Configuration I/O error")]
    Io(#[from] std::io::Error),
}

/// Output emission errors
#[derive(Error, Debug)]
pub enum EmitError {
    /// Image encoding failed
    #[error("Image encoding failed: {reason}")]
    Encoding { reason: String },

    /// I/O error writing the artifact
    #[error("I/O error writing output artifact")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Decode error
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Transform error
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Emitter error
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Transfer(e) => !e.is_fatal() && !e.is_permanent(),
            AppError::Cache(CacheError::SizeMismatch { .. }) => true,
            _ => false,
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "authentication",
            AppError::Transfer(_) => "transfer",
            AppError::Catalog(_) => "catalog",
            AppError::Cache(_) => "cache",
            AppError::Decode(_) => "decode",
            AppError::Transform(_) => "transform",
            AppError::Config(_) => "config",
            AppError::Emit(_) => "emit",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Decode result type alias
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Transform result type alias
pub type TransformResult<T> = std::result::Result<T, TransformError>;
