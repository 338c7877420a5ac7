use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source responded with status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Acquires the source asset into local storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Download `url` into `local_path`, returning the number of bytes written.
    async fn fetch(&self, url: &str, local_path: &Path) -> Result<u64, FetchError>;
}
