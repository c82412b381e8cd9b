//! External tool discovery and the concrete collaborator set
//!
//! The tools are located once, before any unit is scheduled; a missing
//! binary aborts the run.

pub mod ffmpeg;
pub mod tags;

pub use ffmpeg::{
    FfmpegCommand, FfmpegConcatenator, FfmpegMeter, FfmpegTagWriter, FfprobeAlbumProbe,
};
pub use tags::TagAlbumProbe;

use crate::analysis::traits::{AlbumProbe, LoudnessMeter, StreamConcatenator, TagWriter};
use crate::config::{ProbeBackend, Settings};
use crate::error::{ReplaytagError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// The collaborators a run needs
pub struct Toolchain {
    pub meter: Box<dyn LoudnessMeter>,
    /// Only present when the album pass runs
    pub probe: Option<Box<dyn AlbumProbe>>,
    pub concatenator: Box<dyn StreamConcatenator>,
    pub tag_writer: Box<dyn TagWriter>,
}

impl Toolchain {
    /// Locate binaries and build the ffmpeg-backed collaborators
    pub fn locate(settings: &Settings) -> Result<Self> {
        let ffmpeg = locate_tool("ffmpeg", settings.ffmpeg.as_deref())?;
        info!("Using ffmpeg at {}", ffmpeg.display());

        let probe: Option<Box<dyn AlbumProbe>> = match settings.probe {
            _ if !settings.album => None,
            ProbeBackend::Ffprobe => {
                let ffprobe = locate_tool("ffprobe", settings.ffprobe.as_deref())?;
                info!("Using ffprobe at {}", ffprobe.display());
                Some(Box::new(FfprobeAlbumProbe::new(ffprobe)))
            }
            ProbeBackend::Tags => Some(Box::new(TagAlbumProbe)),
        };

        Ok(Self {
            meter: Box::new(FfmpegMeter::new(&ffmpeg)),
            probe,
            concatenator: Box::new(FfmpegConcatenator::new(&ffmpeg)),
            tag_writer: Box::new(FfmpegTagWriter::new(&ffmpeg)),
        })
    }
}

/// Resolve a tool from an explicit path or from `PATH`
pub fn locate_tool(name: &'static str, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ReplaytagError::ToolNotFound {
                name,
                location: format!(" at {}", path.display()),
            })
        };
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    find_in(name, &search_path).ok_or(ReplaytagError::ToolNotFound {
        name,
        location: " in PATH".to_string(),
    })
}

fn find_in(name: &str, search_path: &std::ffi::OsStr) -> Option<PathBuf> {
    let file_name = if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    };

    std::env::split_paths(search_path)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}
