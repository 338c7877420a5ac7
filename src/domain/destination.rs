//! Destination subfolder selection.
//!
//! Subfolders are `root/01`, `root/02`, ... `root/NN`. Each selection lists
//! them in ascending order and picks the first one still under capacity, so
//! uploads pack the lowest-numbered folders first instead of rotating.
//!
//! Counts are read fresh on every call and are not reserved: another job
//! uploading into the same root between the listing and our upload can push
//! a folder past its cap. Running one job per folder set at a time is an
//! operating constraint of the service.

use crate::ports::storage::{DestinationStore, EntryKind, StorageError};
use tracing::{debug, warn};

/// A subfolder considered for the next upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationCandidate {
    /// 1-based index.
    pub index: u32,
    pub path: String,
    pub file_count: usize,
}

/// Remote path of subfolder `index` under `root`.
pub fn subfolder_path(root: &str, index: u32) -> String {
    format!("{}/{:02}", root, index)
}

/// Number of files currently in `folder`.
///
/// A missing folder and a failed listing both count as empty, so a folder
/// is never skipped because it could not be read.
pub async fn folder_file_count<S>(store: &S, folder: &str) -> usize
where
    S: DestinationStore + ?Sized,
{
    match store.list_folder(folder).await {
        Ok(entries) => entries
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .count(),
        Err(StorageError::NotFound(_)) => {
            debug!("{} does not exist yet", folder);
            0
        }
        Err(e) => {
            warn!("Listing {} failed, treating it as empty: {}", folder, e);
            0
        }
    }
}

/// First subfolder in `1..=max_dirs` holding fewer than `max_per` files.
///
/// Returns `None` once every candidate is at capacity.
pub async fn select_destination<S>(
    store: &S,
    root: &str,
    max_dirs: u32,
    max_per: u32,
) -> Option<DestinationCandidate>
where
    S: DestinationStore + ?Sized,
{
    for index in 1..=max_dirs {
        let path = subfolder_path(root, index);
        let file_count = folder_file_count(store, &path).await;
        debug!("{} holds {} files (cap {})", path, file_count, max_per);
        if file_count < max_per as usize {
            return Some(DestinationCandidate {
                index,
                path,
                file_count,
            });
        }
    }
    None
}
