//! Transfer client configuration

use std::time::Duration;

use crate::constants::ftp;

/// Configuration for FTP sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Archive host name
    pub host: String,
    /// Control connection port
    pub port: u16,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Per-file download timeout
    pub download_timeout: Duration,
}

impl TransferConfig {
    /// Build a configuration for a host with default timeouts
    pub fn for_host(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            connect_timeout: ftp::CONNECT_TIMEOUT,
            download_timeout: ftp::DOWNLOAD_TIMEOUT,
        }
    }

    /// host:port address string for the control connection
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::for_host(ftp::DEFAULT_HOST, ftp::DEFAULT_PORT)
    }
}
