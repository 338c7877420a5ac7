//! Job error taxonomy.

use thiserror::Error;

/// Upper bound on diagnostic payloads carried in errors and responses.
pub const MAX_DETAIL_BYTES: usize = 4000;

/// Fatal outcomes of a split-and-upload job.
///
/// Every variant aborts the whole job. A missing duration is not an error:
/// it is logged as a warning and planning continues without it.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("failed to fetch source {url}")]
    Acquisition { url: String, detail: String },

    #[error("ffmpeg segment {sequence} failed")]
    Encode { sequence: u32, detail: String },

    #[error("all destination subfolders under {dest_root} are full")]
    DestinationExhausted { dest_root: String },

    #[error("upload to {path} failed")]
    Upload { path: String, detail: String },

    #[error("scratch storage error: {0}")]
    Scratch(#[from] std::io::Error),
}

impl JobError {
    /// Short machine-readable tag for the error category.
    pub fn category(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation",
            JobError::Acquisition { .. } => "acquisition",
            JobError::Encode { .. } => "encode",
            JobError::DestinationExhausted { .. } => "destination_exhausted",
            JobError::Upload { .. } => "upload",
            JobError::Scratch(_) => "internal",
        }
    }

    /// Diagnostic detail, already bounded to [`MAX_DETAIL_BYTES`].
    pub fn detail(&self) -> Option<String> {
        match self {
            JobError::Acquisition { detail, .. }
            | JobError::Encode { detail, .. }
            | JobError::Upload { detail, .. } => Some(truncate_detail(detail)),
            JobError::Scratch(e) => Some(truncate_detail(&e.to_string())),
            JobError::Validation(_) | JobError::DestinationExhausted { .. } => None,
        }
    }
}

/// Cut `text` to at most [`MAX_DETAIL_BYTES`] bytes without splitting a character.
pub fn truncate_detail(text: &str) -> String {
    if text.len() <= MAX_DETAIL_BYTES {
        return text.to_string();
    }
    let mut end = MAX_DETAIL_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
