//! Ports - Trait definitions for everything outside the domain.

pub mod codec;
pub mod source;
pub mod storage;

pub use codec::{AudioCodec, CodecTool};
pub use source::{FetchError, SourceFetcher};
pub use storage::{DestinationStore, EntryKind, RemoteEntry, StorageError, StoredFile};
