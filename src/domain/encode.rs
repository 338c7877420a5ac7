//! Segment extraction: stream copy first, re-encode as a fallback.

use super::error::truncate_detail;
use super::jobs::SegmentDescriptor;
use crate::ports::codec::{AudioCodec, CodecTool};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Both extraction strategies failed for one segment.
#[derive(Debug, Error)]
#[error("segment {sequence} could not be extracted")]
pub struct EncodeError {
    pub sequence: u32,
    /// Diagnostic output of the fallback attempt, bounded in size.
    pub detail: String,
}

/// Extract `descriptor`'s window of `source` into `out_dir`.
///
/// The stream copy is tried first. Only when it fails (non-zero exit, or a
/// missing or empty output file) is the window re-encoded with the codec
/// matching `format`. There is no retry beyond that single fallback.
pub async fn encode_segment<C>(
    tool: &C,
    source: &Path,
    descriptor: &SegmentDescriptor,
    format: &str,
    out_dir: &Path,
) -> Result<PathBuf, EncodeError>
where
    C: CodecTool + ?Sized,
{
    let output = out_dir.join(descriptor.file_name(format));
    let start = descriptor.start.max(0.0);

    let copied = tool
        .extract_copy(source, start, descriptor.length, &output)
        .await;
    match produced_output(copied, &output).await {
        Ok(()) => {
            debug!("Segment {} stream-copied to {:?}", descriptor.sequence, output);
            return Ok(output);
        }
        Err(reason) => warn!(
            "Stream copy of segment {} failed, re-encoding: {}",
            descriptor.sequence,
            last_line(&reason)
        ),
    }

    let codec = AudioCodec::for_format(format);
    let reencoded = tool
        .extract_reencode(source, start, descriptor.length, codec, &output)
        .await;
    match produced_output(reencoded, &output).await {
        Ok(()) => {
            info!(
                "Segment {} re-encoded with {}",
                descriptor.sequence,
                codec.encoder()
            );
            Ok(output)
        }
        Err(reason) => Err(EncodeError {
            sequence: descriptor.sequence,
            detail: truncate_detail(&reason),
        }),
    }
}

/// Check one tool run: it must exit cleanly and leave a non-empty file behind.
async fn produced_output(run: io::Result<Output>, output: &Path) -> Result<(), String> {
    let run = run.map_err(|e| format!("failed to run media tool: {}", e))?;
    if !run.status.success() {
        return Err(String::from_utf8_lossy(&run.stderr).into_owned());
    }
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(format!("{} is empty", output.display())),
        Err(e) => Err(format!("{} was not written: {}", output.display(), e)),
    }
}

fn last_line(text: &str) -> &str {
    text.trim().lines().last().unwrap_or("")
}

/// Best-effort duration of `media` in seconds.
///
/// Any failure is logged and turned into `None`; callers then plan with an
/// unknown duration.
pub async fn probe_duration<C>(tool: &C, media: &Path) -> Option<f64>
where
    C: CodecTool + ?Sized,
{
    let output = match tool.probe_duration(media).await {
        Ok(output) => output,
        Err(e) => {
            warn!("Duration probe could not run: {}", e);
            return None;
        }
    };
    if !output.status.success() {
        warn!(
            "Duration probe failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.trim().parse::<f64>() {
        Ok(duration) if duration.is_finite() && duration >= 0.0 => Some(duration),
        _ => {
            warn!("Duration probe returned {:?}, planning without it", stdout.trim());
            None
        }
    }
}
