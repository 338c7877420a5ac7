use crate::ports::storage::{DestinationStore, EntryKind, RemoteEntry, StorageError, StoredFile};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// `DestinationStore` over a local directory.
///
/// Remote paths such as `/test/wav/01/a-001.wav` are resolved below `root`.
/// Collisions are renamed the way Dropbox does it: `a-001 (1).wav`,
/// `a-001 (2).wav`, ...
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, remote: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(remote.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::Rejected {
                status: 400,
                body: format!("invalid path {}", remote),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn renamed(path: &Path, attempt: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{} ({})", stem, attempt),
    };
    path.with_file_name(name)
}

#[async_trait]
impl DestinationStore for FsStore {
    async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteEntry>, StorageError> {
        let dir = self.resolve(folder)?;
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(folder.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let kind = if entry.file_type().await?.is_dir() {
                EntryKind::Folder
            } else {
                EntryKind::File
            };
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        Ok(entries)
    }

    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<StoredFile, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut candidate = target.clone();
        let mut attempt = 0;
        let mut file = loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    candidate = renamed(&target, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        };
        file.write_all(&content).await?;
        file.flush().await?;

        let stored = candidate
            .strip_prefix(&self.root)
            .map(|p| format!("/{}", p.to_string_lossy()))
            .unwrap_or_else(|_| path.to_string());
        Ok(StoredFile {
            path: stored,
            size: content.len() as u64,
        })
    }
}
