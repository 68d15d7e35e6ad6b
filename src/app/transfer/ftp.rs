//! FTP transport implementation over suppaftp
//!
//! One `FtpTransport` wraps one logged-in control connection. The archive
//! caps concurrent connections per account, so the scheduler keeps the
//! session count equal to its (conservative) worker count.

use std::path::Path;

use async_trait::async_trait;
use suppaftp::tokio::AsyncFtpStream;
use suppaftp::types::FileType;
use suppaftp::{FtpError, Status};
use tokio::fs::File;
use tracing::{debug, trace};

use crate::auth::FtpCredentials;
use crate::errors::{TransferError, TransferResult};

use super::{Connector, RemoteEntry, Transport, TransferConfig};

/// A live FTP session with the granule archive
pub struct FtpTransport {
    stream: Option<AsyncFtpStream>,
}

impl FtpTransport {
    /// Connect and log in
    ///
    /// # Errors
    ///
    /// `TransferError::Connect` when the control connection cannot be
    /// established, `TransferError::Auth` when the login is rejected.
    pub async fn connect(
        config: &TransferConfig,
        credentials: &FtpCredentials,
    ) -> TransferResult<Self> {
        let address = config.address();
        debug!("Connecting to FTP server {}", address);

        let connect = AsyncFtpStream::connect(&address);
        let mut stream = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| TransferError::Connect {
                host: address.clone(),
                reason: "connection timed out".to_string(),
            })?
            .map_err(|e| TransferError::Connect {
                host: address.clone(),
                reason: e.to_string(),
            })?;

        stream
            .login(credentials.username(), credentials.password())
            .await
            .map_err(|_| TransferError::Auth {
                user: credentials.username().to_string(),
            })?;

        stream
            .transfer_type(FileType::Binary)
            .await
            .map_err(|e| TransferError::Protocol(e.to_string()))?;

        debug!("FTP session established with {}", address);
        Ok(Self {
            stream: Some(stream),
        })
    }

    fn stream(&mut self) -> TransferResult<&mut AsyncFtpStream> {
        self.stream.as_mut().ok_or(TransferError::SessionClosed)
    }
}

/// Map an FTP error for an operation on `path` into the transfer taxonomy
fn map_ftp_error(error: FtpError, path: &str) -> TransferError {
    match &error {
        FtpError::UnexpectedResponse(response)
            if response.status == Status::FileUnavailable =>
        {
            TransferError::RemoteNotFound {
                path: path.to_string(),
            }
        }
        _ => TransferError::Protocol(error.to_string()),
    }
}

#[async_trait]
impl Transport for FtpTransport {
    async fn list(&mut self, remote_dir: &str) -> TransferResult<Vec<RemoteEntry>> {
        let stream = self.stream()?;

        stream
            .cwd(remote_dir)
            .await
            .map_err(|e| map_ftp_error(e, remote_dir))?;

        let names = stream
            .nlst(None)
            .await
            .map_err(|e| map_ftp_error(e, remote_dir))?;

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let size = stream
                .size(&name)
                .await
                .map_err(|e| map_ftp_error(e, &name))? as u64;
            trace!("{}/{} ({} bytes)", remote_dir, name, size);
            entries.push(RemoteEntry { name, size });
        }
        Ok(entries)
    }

    async fn download(&mut self, remote_path: &str, local_tmp: &Path) -> TransferResult<u64> {
        let stream = self.stream()?;

        let mut reader = stream
            .retr_as_stream(remote_path)
            .await
            .map_err(|e| map_ftp_error(e, remote_path))?;
        let mut file = File::create(local_tmp).await?;

        let copied = tokio::io::copy(&mut reader, &mut file).await?;

        stream
            .finalize_retr_stream(reader)
            .await
            .map_err(|e| map_ftp_error(e, remote_path))?;
        file.sync_all().await?;

        debug!("Downloaded {} ({} bytes)", remote_path, copied);
        Ok(copied)
    }

    async fn close(&mut self) -> TransferResult<()> {
        if let Some(mut stream) = self.stream.take() {
            // Best effort: the server may already have dropped us
            if let Err(e) = stream.quit().await {
                debug!("FTP quit failed: {}", e);
            }
        }
        Ok(())
    }
}

/// Connector producing one FTP session per scheduler worker
pub struct FtpConnector {
    config: TransferConfig,
    credentials: FtpCredentials,
}

impl FtpConnector {
    pub fn new(config: TransferConfig, credentials: FtpCredentials) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self) -> TransferResult<Box<dyn Transport>> {
        let transport = FtpTransport::connect(&self.config, &self.credentials).await?;
        Ok(Box::new(transport))
    }
}
