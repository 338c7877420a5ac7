//! Adapters - Concrete implementations of ports.

pub mod dropbox;
pub mod fetch;
pub mod ffmpeg;
pub mod fs;
pub mod http;

use crate::ports::storage::{DestinationStore, RemoteEntry, StorageError, StoredFile};
use async_trait::async_trait;

/// The destination backend picked for a job at runtime.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Dropbox(dropbox::DropboxStore),
    Local(fs::FsStore),
}

#[async_trait]
impl DestinationStore for AnyStore {
    async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteEntry>, StorageError> {
        match self {
            AnyStore::Dropbox(store) => store.list_folder(folder).await,
            AnyStore::Local(store) => store.list_folder(folder).await,
        }
    }

    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<StoredFile, StorageError> {
        match self {
            AnyStore::Dropbox(store) => store.upload(path, content).await,
            AnyStore::Local(store) => store.upload(path, content).await,
        }
    }
}
