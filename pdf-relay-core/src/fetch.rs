use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::contract::Fetcher;
use crate::error::FetchError;

/// Streams response bodies straight into the destination file; nothing is buffered whole.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(FetchError::TooLarge {
                    max_bytes: self.max_bytes,
                    actual: content_len,
                });
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dest)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(FetchError::TooLarge {
                    max_bytes: self.max_bytes,
                    actual: written,
                });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::Io(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        tracing::debug!(url, bytes = written, "[TRANSFER] Streamed document to artifact");
        Ok(written)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Transport(format!("timeout: {err}"));
    }
    FetchError::Transport(err.to_string())
}
