//! ffmpeg / ffprobe backed collaborators
//!
//! Every invocation runs the binary found at preflight with a fixed argument
//! list. A non-zero exit is a hard failure carrying the tool's stderr.

use crate::analysis::ebur128;
use crate::analysis::traits::{AlbumProbe, LoudnessMeter, StreamConcatenator, TagField, TagWriter};
use crate::error::{ReplaytagError, Result};
use crate::types::LoudnessMeasurement;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Argument builder for one ffmpeg/ffprobe run
pub struct FfmpegCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl FfmpegCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("-i".into());
        self.args.push(path.as_ref().as_os_str().to_owned());
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().as_os_str().to_owned());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(OsString::from));
        self
    }

    pub fn metadata(mut self, tag: &TagField) -> Self {
        self.args.push("-metadata".into());
        self.args.push(format!("{}={}", tag.key, tag.value).into());
        self
    }

    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion; Err carries stderr on non-zero exit
    pub fn execute(self) -> std::result::Result<Output, String> {
        debug!("{}", self.command_line());

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| format!("failed to start {}: {}", self.program.display(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} ({})", stderr.trim(), output.status));
        }

        Ok(output)
    }
}

/// EBU R128 measurement through the `ebur128` filter
pub struct FfmpegMeter {
    ffmpeg: PathBuf,
}

impl FfmpegMeter {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl LoudnessMeter for FfmpegMeter {
    fn measure(&self, path: &Path) -> Result<LoudnessMeasurement> {
        if !path.exists() {
            return Err(ReplaytagError::FileNotFound(path.to_path_buf()));
        }

        let output = FfmpegCommand::new(&self.ffmpeg)
            .args(&["-hide_banner", "-nostats"])
            .input(path)
            .args(&[
                "-filter_complex",
                "ebur128=peak=true:framelog=verbose",
                "-f",
                "null",
                "-",
            ])
            .execute()
            .map_err(|reason| ReplaytagError::measurement_failure(path, reason))?;

        // The filter reports on stderr
        let report = String::from_utf8_lossy(&output.stderr);
        ebur128::parse_report(&report, path)
    }

    fn name(&self) -> &'static str {
        "ffmpeg-ebur128"
    }
}

/// Lossless concatenation through the concat demuxer
pub struct FfmpegConcatenator {
    ffmpeg: PathBuf,
}

impl FfmpegConcatenator {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl StreamConcatenator for FfmpegConcatenator {
    fn concatenate(&self, descriptor: &Path, output: &Path) -> Result<()> {
        FfmpegCommand::new(&self.ffmpeg)
            .args(&["-hide_banner", "-y", "-f", "concat", "-safe", "0"])
            .input(descriptor)
            .args(&["-c", "copy"])
            .output(output)
            .execute()
            .map_err(|reason| ReplaytagError::ConcatenationFailure {
                album: output.display().to_string(),
                reason,
            })?;

        Ok(())
    }
}

/// Stream-copy with injected tags
pub struct FfmpegTagWriter {
    ffmpeg: PathBuf,
}

impl FfmpegTagWriter {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl TagWriter for FfmpegTagWriter {
    fn write_tags(&self, source: &Path, tags: &[TagField], output: &Path) -> Result<()> {
        let command = FfmpegCommand::new(&self.ffmpeg)
            .args(&["-hide_banner", "-y"])
            .input(source)
            .args(&["-map", "0", "-codec", "copy", "-write_id3v2", "1"]);

        tags.iter()
            .fold(command, |cmd, tag| cmd.metadata(tag))
            .output(output)
            .execute()
            .map_err(|reason| ReplaytagError::TagWriteFailure {
                path: source.to_path_buf(),
                reason,
            })?;

        Ok(())
    }
}

/// Album lookup through `ffprobe -show_format`
pub struct FfprobeAlbumProbe {
    ffprobe: PathBuf,
}

impl FfprobeAlbumProbe {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Album tag from ffprobe's JSON, whatever case the container uses for the key
pub fn album_from_probe_json(json: &[u8]) -> std::result::Result<String, serde_json::Error> {
    let parsed: ProbeOutput = serde_json::from_slice(json)?;

    Ok(parsed
        .format
        .tags
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("album"))
        .map(|(_, value)| value)
        .unwrap_or_default())
}

impl AlbumProbe for FfprobeAlbumProbe {
    fn album(&self, path: &Path) -> Result<String> {
        let output = FfmpegCommand::new(&self.ffprobe)
            .args(&["-v", "quiet", "-show_format", "-print_format", "json"])
            .output(path)
            .execute()
            .map_err(|reason| ReplaytagError::probe_failure(path, reason))?;

        album_from_probe_json(&output.stdout).map_err(|e| {
            ReplaytagError::probe_failure(path, format!("invalid ffprobe JSON: {}", e))
        })
    }

    fn name(&self) -> &'static str {
        "ffprobe"
    }
}
