//! Transfer client for the remote granule archive
//!
//! This layer wraps one FTP session behind the [`Transport`] trait: directory
//! listing, file download, and session teardown. It performs no retries and
//! no caching; the acquisition scheduler owns those concerns, keeping this
//! layer a thin, substitutable transport.
//!
//! A session is a scoped resource: the scheduler opens one per worker and
//! closes them on every exit path, including failure.

mod config;
mod ftp;

#[cfg(test)]
pub(crate) mod memory;

pub use config::TransferConfig;
pub use ftp::{FtpConnector, FtpTransport};

use std::path::Path;

use async_trait::async_trait;

use crate::errors::TransferResult;

/// One entry in a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File name within the listed directory
    pub name: String,
    /// Size in bytes as reported by the server
    pub size: u64,
}

/// A live session with the remote archive
///
/// Each scheduler worker owns its own session, so access is serialized by
/// construction; the worker task itself still crosses threads, hence the
/// `Send + Sync` bound.
#[async_trait]
pub trait Transport: Send + Sync {
    /// List the contents of a remote directory
    ///
    /// Fails with `TransferError::RemoteNotFound` when the directory does
    /// not exist.
    async fn list(&mut self, remote_dir: &str) -> TransferResult<Vec<RemoteEntry>>;

    /// Download a remote file into a local temporary path
    ///
    /// Returns the number of bytes transferred. On any interruption the
    /// caller removes the temporary file; nothing is ever promoted here.
    async fn download(&mut self, remote_path: &str, local_tmp: &Path) -> TransferResult<u64>;

    /// Close the session
    async fn close(&mut self) -> TransferResult<()>;
}

/// Factory for per-worker transport sessions
///
/// Connecting is the only place `Connect`/`Auth` errors can surface; both are
/// fatal to the scheduler run.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> TransferResult<Box<dyn Transport>>;
}
