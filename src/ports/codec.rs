use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Output;

/// Audio codec used when a segment has to be re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Mp3,
    PcmS16le,
}

impl AudioCodec {
    /// Lossy codecs for compressed containers, 16-bit PCM for everything else.
    pub fn for_format(format: &str) -> Self {
        match format {
            "m4a" | "aac" => AudioCodec::Aac,
            "mp3" => AudioCodec::Mp3,
            _ => AudioCodec::PcmS16le,
        }
    }

    /// Encoder name as understood by ffmpeg.
    pub fn encoder(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "libmp3lame",
            AudioCodec::PcmS16le => "pcm_s16le",
        }
    }

    pub fn bitrate(&self) -> Option<&'static str> {
        match self {
            AudioCodec::Aac | AudioCodec::Mp3 => Some("128k"),
            AudioCodec::PcmS16le => None,
        }
    }
}

/// Media tool used to probe the source and cut time windows out of it.
///
/// Implementations only run the tool; deciding whether a run succeeded (exit
/// status, non-empty output) is left to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodecTool: Send + Sync {
    /// Copy `[start, start + length)` of `source` into `output` without re-encoding.
    async fn extract_copy(
        &self,
        source: &Path,
        start: f64,
        length: f64,
        output: &Path,
    ) -> io::Result<Output>;

    /// Re-encode the first audio stream of `[start, start + length)` into `output`,
    /// dropping every non-audio stream.
    async fn extract_reencode(
        &self,
        source: &Path,
        start: f64,
        length: f64,
        codec: AudioCodec,
        output: &Path,
    ) -> io::Result<Output>;

    /// Report the container duration in seconds on stdout.
    async fn probe_duration(&self, media: &Path) -> io::Result<Output>;
}
