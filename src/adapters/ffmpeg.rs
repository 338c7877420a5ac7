use crate::ports::codec::{AudioCodec, CodecTool};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// `CodecTool` backed by the ffmpeg and ffprobe command line tools.
///
/// Runs have no timeout of their own.
#[derive(Debug, Clone)]
pub struct FfmpegCli {
    ffmpeg: OsString,
    ffprobe: OsString,
}

impl FfmpegCli {
    pub fn new(ffmpeg: impl Into<OsString>, ffprobe: impl Into<OsString>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Arguments shared by both extraction modes, up to the output options.
    fn window_args(source: &Path, start: f64, length: f64) -> Vec<OsString> {
        vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-y".into(),
            "-ss".into(),
            seconds(start).into(),
            "-i".into(),
            source.into(),
            "-t".into(),
            seconds(length).into(),
        ]
    }

    fn copy_args(source: &Path, start: f64, length: f64, output: &Path) -> Vec<OsString> {
        let mut args = Self::window_args(source, start, length);
        args.extend(os_args(&["-c", "copy"]));
        args.push(output.into());
        args
    }

    fn reencode_args(
        source: &Path,
        start: f64,
        length: f64,
        codec: AudioCodec,
        output: &Path,
    ) -> Vec<OsString> {
        let mut args = Self::window_args(source, start, length);
        args.extend(os_args(&["-map", "0:a:0", "-vn", "-c:a", codec.encoder()]));
        if let Some(bitrate) = codec.bitrate() {
            args.extend(os_args(&["-b:a", bitrate]));
        }
        args.push(output.into());
        args
    }

    async fn run(program: &OsString, args: Vec<OsString>) -> io::Result<Output> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
    }
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

fn seconds(value: f64) -> String {
    format!("{:.3}", value)
}

#[async_trait]
impl CodecTool for FfmpegCli {
    async fn extract_copy(
        &self,
        source: &Path,
        start: f64,
        length: f64,
        output: &Path,
    ) -> io::Result<Output> {
        Self::run(&self.ffmpeg, Self::copy_args(source, start, length, output)).await
    }

    async fn extract_reencode(
        &self,
        source: &Path,
        start: f64,
        length: f64,
        codec: AudioCodec,
        output: &Path,
    ) -> io::Result<Output> {
        Self::run(
            &self.ffmpeg,
            Self::reencode_args(source, start, length, codec, output),
        )
        .await
    }

    async fn probe_duration(&self, media: &Path) -> io::Result<Output> {
        let mut args = os_args(&[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]);
        args.push(media.into());
        Self::run(&self.ffprobe, args).await
    }
}
