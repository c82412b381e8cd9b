//! In-process album lookup from audio file tags
//!
//! Uses lofty to read ID3v2 (MP3), Vorbis comments (FLAC, OGG), APE and MP4
//! tags. Needs no external binary, so it can stand in for ffprobe.

use crate::analysis::traits::AlbumProbe;
use crate::error::{ReplaytagError, Result};
use lofty::{Accessor, Probe, TaggedFileExt};
use std::path::Path;
use tracing::debug;

pub struct TagAlbumProbe;

impl AlbumProbe for TagAlbumProbe {
    fn album(&self, path: &Path) -> Result<String> {
        read_album(path).map_err(|e| ReplaytagError::probe_failure(path, e.to_string()))
    }

    fn name(&self) -> &'static str {
        "lofty"
    }
}

fn read_album(path: &Path) -> std::result::Result<String, lofty::error::LoftyError> {
    let tagged_file = Probe::open(path)?.read()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let album = match tag {
        Some(tag) => tag.album().map(|s| s.to_string()).unwrap_or_default(),
        None => {
            debug!("No tags found in {}", path.display());
            String::new()
        }
    };

    Ok(album)
}
