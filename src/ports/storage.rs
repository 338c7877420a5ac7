use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    Deleted,
}

/// One entry of a remote folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
        }
    }
}

/// What the store reports after accepting an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Final path, which differs from the requested one after an auto-rename.
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("storage rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Remote folder tree the segments are distributed into.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// List the direct children of `folder`.
    ///
    /// A folder that does not exist yet yields [`StorageError::NotFound`].
    async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteEntry>, StorageError>;

    /// Write `content` to `path` in add mode, renaming on collision.
    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<StoredFile, StorageError>;
}
