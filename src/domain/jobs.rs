use super::error::JobError;
use super::source::{is_supported_share_url, to_direct_download};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_SEGMENT_SECONDS: i64 = 400;
pub const DEFAULT_OVERLAP_SECONDS: i64 = 10;
pub const DEFAULT_FORMAT: &str = "wav";
pub const DEFAULT_DEST_ROOT: &str = "/test/wav";
pub const DEFAULT_MAX_DIRS: u32 = 5;
pub const DEFAULT_MAX_FILES_PER_DIR: u32 = 5;

/// Body of a split-and-upload request, as received on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRequest {
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub segment_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub overlap_seconds: Option<i64>,
    pub format: Option<String>,
    pub dropbox_token: Option<String>,
    pub dest_root: Option<String>,
    pub group_prefix: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub max_dirs: Option<u32>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub max_files_per_dir: Option<u32>,
}

/// Immutable configuration of one split-and-upload invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Direct-download URL of the source asset.
    pub source_url: String,
    pub segment_seconds: u32,
    pub overlap_seconds: u32,
    /// Lowercase extension without a leading dot, e.g. `wav`.
    pub format: String,
    /// Destination root without a trailing slash.
    pub dest_root: String,
    pub group_prefix: String,
    pub max_dirs: u32,
    pub max_files_per_dir: u32,
}

impl JobRequest {
    /// Validate the request and split it into the job and the storage token.
    ///
    /// Nothing is allocated before this succeeds.
    pub fn into_job(self) -> Result<(Job, String), JobError> {
        let url = self
            .url
            .filter(|u| is_supported_share_url(u))
            .ok_or_else(|| JobError::Validation("Missing or invalid Dropbox share URL".into()))?;

        let token = self
            .dropbox_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| JobError::Validation("Missing dropbox_token".into()))?;

        let segment_seconds = self.segment_time.unwrap_or(DEFAULT_SEGMENT_SECONDS);
        let segment_seconds = u32::try_from(segment_seconds)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| JobError::Validation("segment_time must be a positive integer".into()))?;

        let overlap_seconds = self.overlap_seconds.unwrap_or(DEFAULT_OVERLAP_SECONDS);
        let overlap_seconds = u32::try_from(overlap_seconds).map_err(|_| {
            JobError::Validation("overlap_seconds must be zero or a positive integer".into())
        })?;

        let format = normalize_format(self.format.as_deref().unwrap_or(DEFAULT_FORMAT));
        if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(JobError::Validation(format!("Unsupported format {:?}", format)));
        }

        let dest_root = self
            .dest_root
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEST_ROOT.to_string());
        let dest_root = dest_root.trim_end_matches('/').to_string();

        let group_prefix = self
            .group_prefix
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(random_group_prefix);
        if !is_plain_file_stem(&group_prefix) {
            return Err(JobError::Validation(format!(
                "Unsupported group_prefix {:?}",
                group_prefix
            )));
        }

        let job = Job {
            source_url: to_direct_download(&url),
            segment_seconds,
            overlap_seconds,
            format,
            dest_root,
            group_prefix,
            max_dirs: self.max_dirs.unwrap_or(DEFAULT_MAX_DIRS),
            max_files_per_dir: self.max_files_per_dir.unwrap_or(DEFAULT_MAX_FILES_PER_DIR),
        };
        Ok((job, token))
    }
}

/// Integer field that also accepts numeric strings and floats (truncated).
fn lenient_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let truncated = |f: f64| Some(f).filter(|f| f.is_finite()).map(|f| f.trunc() as i64);
    let number = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(truncated)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncated))
        }
        Some(other) => return Err(D::Error::custom(format!("expected an integer, got {}", other))),
    };
    number
        .and_then(|n| T::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| D::Error::custom("expected an integer in range"))
}

/// A prefix ends up inside a file name, so it must not add path components.
fn is_plain_file_stem(prefix: &str) -> bool {
    !prefix.contains(['/', '\\'])
        && prefix != "."
        && prefix != ".."
        && !prefix.chars().any(char::is_control)
}

fn normalize_format(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn random_group_prefix() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("group-{}", &hex[..6])
}

impl Job {
    /// Remote path of segment `sequence` inside subfolder `folder`.
    pub fn segment_dest(&self, folder: &str, sequence: u32) -> String {
        format!(
            "{}/{}-{:03}.{}",
            folder, self.group_prefix, sequence, self.format
        )
    }
}

/// One planned time window of the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentDescriptor {
    /// 1-based, contiguous.
    pub sequence: u32,
    pub start: f64,
    pub length: f64,
}

impl SegmentDescriptor {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }

    /// Local file name for the extracted segment.
    pub fn file_name(&self, format: &str) -> String {
        format!("segment-{:03}.{}", self.sequence, format)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub dest: String,
    pub size: u64,
}

/// Outcome of a job that ran to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub status: String,
    pub group_prefix: String,
    pub uploaded_count: usize,
    pub uploaded: Vec<UploadRecord>,
    pub watch_hint: String,
}

impl JobReport {
    pub fn success(job: &Job, uploaded: Vec<UploadRecord>) -> Self {
        Self {
            status: "success".to_string(),
            group_prefix: job.group_prefix.clone(),
            uploaded_count: uploaded.len(),
            uploaded,
            watch_hint: format!(
                "Watch {}/01; uploads fill the lowest-numbered subfolder first (<{} files).",
                job.dest_root, job.max_files_per_dir
            ),
        }
    }
}
