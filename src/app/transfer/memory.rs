//! In-memory transport for scheduler and pipeline tests
//!
//! Serves a scripted remote tree without any network, counts calls, and can
//! inject per-path or blanket transfer failures. Failed downloads leave a
//! half-written temporary file behind, mimicking an interrupted stream.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::app::models::GranuleRef;
use crate::errors::{TransferError, TransferResult};

use super::{Connector, RemoteEntry, Transport};

#[derive(Default)]
struct Inner {
    /// dir -> (name -> content)
    files: HashMap<String, HashMap<String, Vec<u8>>>,
    /// remote path -> remaining scripted failures
    failures: HashMap<String, u32>,
    fail_all: bool,
    refuse_connect: Option<TransferErrorKind>,
    connect_calls: usize,
    list_calls: usize,
    download_calls: usize,
}

#[derive(Clone, Copy, Debug)]
pub enum TransferErrorKind {
    Connect,
    Auth,
}

/// Shared scripted archive backing any number of sessions
#[derive(Clone, Default)]
pub struct MemoryArchive {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at `dir/name` with the given content
    pub fn add_file(&self, dir: &str, name: &str, content: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .files
            .entry(dir.to_string())
            .or_default()
            .insert(name.to_string(), content.to_vec());
    }

    /// Add a granule file at its derived remote location
    pub fn add_granule(&self, granule: &GranuleRef, content: &[u8]) {
        self.add_file(&granule.remote_dir(), granule.file_name(), content);
    }

    /// Make the listed directory exist but be empty
    pub fn add_empty_dir(&self, dir: &str) {
        self.inner
            .lock()
            .unwrap()
            .files
            .entry(dir.to_string())
            .or_default();
    }

    /// Script `times` consecutive interrupted downloads for one remote path
    pub fn fail_downloads(&self, remote_path: &str, times: u32) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert(remote_path.to_string(), times);
    }

    /// Interrupt every download attempt
    pub fn fail_all_downloads(&self) {
        self.inner.lock().unwrap().fail_all = true;
    }

    /// Refuse future connections with the given session-level error
    pub fn refuse_connections(&self, kind: TransferErrorKind) {
        self.inner.lock().unwrap().refuse_connect = Some(kind);
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.lock().unwrap().connect_calls
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }

    pub fn download_calls(&self) -> usize {
        self.inner.lock().unwrap().download_calls
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            archive: self.clone(),
        }
    }
}

/// One session against the scripted archive
pub struct MemoryTransport {
    archive: MemoryArchive,
    closed: bool,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn list(&mut self, remote_dir: &str) -> TransferResult<Vec<RemoteEntry>> {
        if self.closed {
            return Err(TransferError::SessionClosed);
        }
        let mut inner = self.archive.inner.lock().unwrap();
        inner.list_calls += 1;

        let dir = inner
            .files
            .get(remote_dir)
            .ok_or_else(|| TransferError::RemoteNotFound {
                path: remote_dir.to_string(),
            })?;

        let mut entries: Vec<RemoteEntry> = dir
            .iter()
            .map(|(name, content)| RemoteEntry {
                name: name.clone(),
                size: content.len() as u64,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn download(&mut self, remote_path: &str, local_tmp: &Path) -> TransferResult<u64> {
        if self.closed {
            return Err(TransferError::SessionClosed);
        }

        let (content, fail) = {
            let mut inner = self.archive.inner.lock().unwrap();
            inner.download_calls += 1;

            let (dir, name) = remote_path
                .rsplit_once('/')
                .ok_or_else(|| TransferError::RemoteNotFound {
                    path: remote_path.to_string(),
                })?;
            let content = inner
                .files
                .get(dir)
                .and_then(|d| d.get(name))
                .cloned()
                .ok_or_else(|| TransferError::RemoteNotFound {
                    path: remote_path.to_string(),
                })?;

            let fail = if inner.fail_all {
                true
            } else if let Some(remaining) = inner.failures.get_mut(remote_path) {
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            } else {
                false
            };
            (content, fail)
        };

        if fail {
            // Leave a half-written temp file, like a dropped stream would
            let half = content.len() / 2;
            tokio::fs::write(local_tmp, &content[..half]).await?;
            return Err(TransferError::Interrupted {
                path: remote_path.to_string(),
                received: half as u64,
                expected: content.len() as u64,
            });
        }

        tokio::fs::write(local_tmp, &content).await?;
        Ok(content.len() as u64)
    }

    async fn close(&mut self) -> TransferResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Connector handing out sessions against the shared archive
pub struct MemoryConnector {
    archive: MemoryArchive,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> TransferResult<Box<dyn Transport>> {
        let mut inner = self.archive.inner.lock().unwrap();
        inner.connect_calls += 1;
        match inner.refuse_connect {
            Some(TransferErrorKind::Connect) => Err(TransferError::Connect {
                host: "memory".to_string(),
                reason: "scripted refusal".to_string(),
            }),
            Some(TransferErrorKind::Auth) => Err(TransferError::Auth {
                user: "memory".to_string(),
            }),
            None => Ok(Box::new(MemoryTransport {
                archive: self.archive.clone(),
                closed: false,
            })),
        }
    }
}
