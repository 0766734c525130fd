//! HTTP client with connection pooling

use crucible_errors::{Error, SourceError};
use futures::StreamExt;
use reqwest::{Client, Response};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes for large downloads
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("crucible/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetConfig {
    /// Configuration with a custom overall timeout in seconds
    #[must_use]
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(secs),
            ..Self::default()
        }
    }
}

/// Outcome of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub size: u64,
    /// Lowercase hex SHA-256 of the written file
    pub sha256: String,
}

/// HTTP client wrapper
#[derive(Debug, Clone)]
pub struct NetClient {
    client: Client,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: &NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(&NetConfig::default())
    }

    /// Execute a GET request, failing on non-success status
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure, timeout, or a non-2xx status.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| SourceError::FetchFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        Ok(response)
    }

    /// Stream a URL to `dest`, computing its SHA-256 as it arrives
    ///
    /// A partially written file is removed on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be written.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<DownloadResult, Error> {
        tracing::debug!(url, dest = %dest.display(), "downloading");

        let response = self.get(url).await?;
        let result = Self::write_stream(url, response, dest).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }

    async fn write_stream(
        url: &str,
        response: Response,
        dest: &Path,
    ) -> Result<DownloadResult, Error> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut size = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SourceError::FetchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, dest))?;
            size += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;

        Ok(DownloadResult {
            size,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}
