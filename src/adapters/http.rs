//! Streaming HTTP downloads.
//!
//! Bodies are written chunk by chunk so large videos never sit in memory on
//! constrained hardware.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::domain::SyncError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_BUFFER: usize = 64 * 1024;

/// Build the HTTP client shared by the manifest fetcher and the downloader
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("kiosk-sync/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes written to disk
    pub bytes: u64,

    /// Response Content-Type, if the server sent one
    pub content_type: Option<String>,
}

/// Direct downloader streaming responses to disk
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Check that the network is reachable
    pub async fn probe(&self, url: &str, timeout: Duration) -> Result<(), SyncError> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("connectivity check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Network(format!(
                "connectivity check returned HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Stream `url` into `temp_path`.
    ///
    /// `timeout` bounds both the wait for response headers and every idle gap
    /// between chunks. On failure `temp_path` is removed.
    pub async fn download(
        &self,
        url: &str,
        temp_path: &Path,
        timeout: Duration,
    ) -> Result<Transfer, SyncError> {
        match self.stream_to(url, temp_path, timeout).await {
            Ok(transfer) => Ok(transfer),
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(temp_path).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %temp_path.display(), error = %rm, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        url: &str,
        temp_path: &Path,
        timeout: Duration,
    ) -> Result<Transfer, SyncError> {
        let response = tokio::time::timeout(timeout, self.client.get(url).send())
            .await
            .map_err(|_| SyncError::Download(format!("no response within {:?}", timeout)))?
            .map_err(|e| SyncError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Download(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let expected_len = response.content_length();

        let file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| SyncError::filesystem(temp_path, e))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER, file);

        let io_error = |e: std::io::Error| SyncError::Download(format!("write failed: {}", e));
        let mut stream = response.bytes_stream();
        let mut bytes: u64 = 0;

        loop {
            let next = tokio::time::timeout(timeout, stream.next())
                .await
                .map_err(|_| SyncError::Download(format!("stalled for {:?}", timeout)))?;

            match next {
                Some(Ok(chunk)) => {
                    writer.write_all(&chunk).await.map_err(io_error)?;
                    bytes += chunk.len() as u64;
                }
                Some(Err(e)) => return Err(SyncError::Download(e.to_string())),
                None => break,
            }
        }

        writer.flush().await.map_err(io_error)?;
        writer.into_inner().sync_all().await.map_err(io_error)?;

        if let Some(expected) = expected_len {
            if bytes != expected {
                return Err(SyncError::Download(format!(
                    "truncated body: {} of {} bytes",
                    bytes, expected
                )));
            }
        }

        debug!(url, bytes, "Transfer complete");
        Ok(Transfer {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> HttpDownloader {
        HttpDownloader::new(http_client().unwrap())
    }

    #[tokio::test]
    async fn test_download_streams_body() {
        let server = MockServer::start().await;
        let body = vec![7u8; 256 * 1024];
        Mock::given(method("GET"))
            .and(path("/algebra.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(body.clone()),
            )
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join(".algebra.part");
        let url = format!("{}/algebra.pdf", server.uri());

        let transfer = downloader()
            .download(&url, &target, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(transfer.bytes, body.len() as u64);
        assert_eq!(transfer.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(std::fs::read(&target).unwrap(), body);
    }

    #[tokio::test]
    async fn test_error_status_removes_temp_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join(".missing.part");
        std::fs::write(&target, b"").unwrap();

        let result = downloader()
            .download(&format!("{}/missing.pdf", server.uri()), &target, Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(SyncError::Download(_))));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join(".slow.part");

        let result = downloader()
            .download(&format!("{}/slow.pdf", server.uri()), &target, Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(SyncError::Download(_))));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_probe() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let downloader = downloader();
        assert!(downloader
            .probe(&format!("{}/up", server.uri()), Duration::from_secs(5))
            .await
            .is_ok());
        assert!(matches!(
            downloader
                .probe(&format!("{}/down", server.uri()), Duration::from_secs(5))
                .await,
            Err(SyncError::Network(_))
        ));
    }
}
