//! Album grouping and combined album measurement
//!
//! Album gain is measured on one stream: all tracks of the album are
//! stream-copied into a single temporary file and that file is measured once.
//! Every member then receives the same gain, range and peak. The album peak is
//! therefore the peak of the concatenated stream, which approximates the
//! maximum of the per-track peaks.

use crate::analysis::gain::GainSettings;
use crate::analysis::traits::{AlbumProbe, LoudnessMeter, StreamConcatenator};
use crate::error::{ReplaytagError, Result};
use crate::pipeline::scheduler::Scheduler;
use crate::types::{check_extension, extension_of, ScanResult};
use indicatif::ProgressBar;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tracks sharing one album tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumGroup {
    /// Album name; empty for untagged tracks
    pub album: String,
    /// Member tracks in input order
    pub tracks: Vec<PathBuf>,
}

impl AlbumGroup {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Album tag lookup result for one input track
#[derive(Debug, Clone)]
pub struct ProbedTrack {
    /// Position in the input list, used to keep grouping deterministic
    pub index: usize,
    pub path: PathBuf,
    /// Empty when the track has no album tag or the probe failed
    pub album: String,
}

/// Look up the album tag of every track, one scheduled unit per track
///
/// A failed probe is logged and the track is treated as untagged.
pub fn probe_albums(
    scheduler: &Scheduler,
    probe: &dyn AlbumProbe,
    tracks: &[PathBuf],
    progress: &ProgressBar,
) -> Vec<ProbedTrack> {
    let units: Vec<(usize, PathBuf)> = tracks.iter().cloned().enumerate().collect();

    scheduler.run(units, tracks.len(), progress, |(index, path), tx| {
        let album = match probe.album(&path) {
            Ok(album) => album,
            Err(e) => {
                warn!("{} (treating as untagged)", e);
                String::new()
            }
        };
        let _ = tx.send(ProbedTrack { index, path, album });
    })
}

/// Group probed tracks by album name
///
/// Groups are ordered by album name and keep input order inside each group.
/// Tracks without an album tag each form their own group.
pub fn group_by_album(mut probed: Vec<ProbedTrack>) -> Vec<AlbumGroup> {
    probed.sort_by_key(|t| t.index);

    let mut albums: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut untagged = Vec::new();

    for track in probed {
        if track.album.trim().is_empty() {
            untagged.push(AlbumGroup {
                album: String::new(),
                tracks: vec![track.path],
            });
        } else {
            albums.entry(track.album).or_default().push(track.path);
        }
    }

    albums
        .into_iter()
        .map(|(album, tracks)| AlbumGroup { album, tracks })
        .chain(untagged)
        .collect()
}

/// Measure one track on its own
pub fn scan_track(
    path: &Path,
    meter: &dyn LoudnessMeter,
    gain: &GainSettings,
) -> Result<ScanResult> {
    check_extension(path)?;

    debug!("Measuring {} with {}", path.display(), meter.name());
    let measurement = meter.measure(path)?;

    Ok(gain.scan_result(path, &measurement))
}

/// Everything needed to combine and measure album groups
pub struct AlbumScanner<'a> {
    pub meter: &'a dyn LoudnessMeter,
    pub concatenator: &'a dyn StreamConcatenator,
    pub gain: &'a GainSettings,
    /// Directory for combined files and concat descriptors
    pub temp_dir: &'a Path,
}

impl AlbumScanner<'_> {
    /// Produce one result per member track, or fail the whole group
    pub fn scan(&self, group: &AlbumGroup) -> Result<Vec<ScanResult>> {
        match group.tracks.as_slice() {
            [] => Ok(Vec::new()),
            [single] => Ok(vec![scan_track(single, self.meter, self.gain)?]),
            tracks => self.scan_combined(&group.album, tracks),
        }
    }

    fn scan_combined(&self, album: &str, tracks: &[PathBuf]) -> Result<Vec<ScanResult>> {
        for track in tracks {
            check_extension(track)?;
        }
        let extension = common_extension(album, tracks)?;

        let hash = hash_paths(tracks);
        let descriptor = write_concat_descriptor(tracks, &hash, self.temp_dir)?;
        let combined = TempArtifact(
            self.temp_dir
                .join(format!("replaytag-{}.{}", hash, extension)),
        );

        debug!(
            "Combining {} tracks of '{}' into {}",
            tracks.len(),
            album,
            combined.0.display()
        );

        self.concatenator
            .concatenate(descriptor.path(), &combined.0)
            .map_err(|e| match e {
                ReplaytagError::ConcatenationFailure { reason, .. } => {
                    ReplaytagError::ConcatenationFailure {
                        album: album.to_string(),
                        reason,
                    }
                }
                other => other,
            })?;

        let measurement = self.meter.measure(&combined.0)?;
        let combined_result = self.gain.scan_result(&combined.0, &measurement);

        Ok(tracks
            .iter()
            .map(|track| combined_result.for_member(track))
            .collect())
    }
}

/// Removes a file when dropped, whatever path the scan took
struct TempArtifact(PathBuf);

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!("Removed {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.0.display(), e),
        }
    }
}

fn common_extension(album: &str, tracks: &[PathBuf]) -> Result<String> {
    let mut extensions: Vec<String> = tracks
        .iter()
        .map(|t| extension_of(t).unwrap_or_default())
        .collect();
    extensions.sort();
    extensions.dedup();

    match extensions.as_slice() {
        [single] => Ok(single.clone()),
        _ => Err(ReplaytagError::MixedFormatInAlbum {
            album: album.to_string(),
            extensions: extensions.join(", "),
        }),
    }
}

/// Stable name for a group: hex SHA-256 over the member paths in order
pub fn hash_paths(tracks: &[PathBuf]) -> String {
    let mut hasher = Sha256::new();
    for track in tracks {
        hasher.update(track.as_os_str().as_encoded_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Quote a path for a concat descriptor line
///
/// Inside single quotes the only special character is `'` itself, which has
/// to close the quote, emit an escaped quote and reopen: `'\''`.
pub fn escape_quotes(path: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len());
    for &byte in path {
        if byte == b'\'' {
            out.extend_from_slice(br"'\''");
        } else {
            out.push(byte);
        }
    }
    out
}

/// Concat descriptor contents, one `file '<path>'` line per track
///
/// Paths are made absolute because the muxer resolves relative entries
/// against the descriptor's own directory. They are written byte for byte,
/// so names that are not valid UTF-8 still resolve.
pub fn concat_descriptor(tracks: &[PathBuf]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for track in tracks {
        let absolute = absolutize(track)?;
        out.extend_from_slice(b"file '");
        out.extend_from_slice(&escape_quotes(path_bytes(&absolute)?));
        out.extend_from_slice(b"'\n");
    }
    Ok(out)
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Result<&[u8]> {
    use std::os::unix::ffi::OsStrExt;
    Ok(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Result<&[u8]> {
    path.to_str()
        .map(str::as_bytes)
        .ok_or_else(|| ReplaytagError::NonUtf8Path(path.to_path_buf()))
}

fn write_concat_descriptor(
    tracks: &[PathBuf],
    hash: &str,
    temp_dir: &Path,
) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("replaytag-{}-", hash))
        .suffix(".txt")
        .tempfile_in(temp_dir)?;

    file.write_all(&concat_descriptor(tracks)?)?;
    file.flush()?;

    Ok(file)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
