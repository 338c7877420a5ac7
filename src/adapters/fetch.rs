use crate::ports::source::{FetchError, SourceFetcher};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::info;

/// Downloads source assets over HTTP(S), following redirects.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, local_path: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let reader = StreamReader::new(body);
        futures::pin_mut!(reader);

        let mut file = BufWriter::new(File::create(local_path).await?);
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        info!("Fetched {} bytes into {:?}", written, local_path);
        Ok(written)
    }
}
