//! Collaborator trait abstractions
//!
//! Every external process the pipeline relies on sits behind one of these
//! traits. The shipped implementations shell out to ffmpeg/ffprobe (see
//! `crate::tools`); tests substitute in-process stubs.

use crate::error::Result;
use crate::types::LoudnessMeasurement;
use std::path::Path;

/// Loudness measurement backend
pub trait LoudnessMeter: Send + Sync {
    /// Measure integrated loudness, loudness range and true peak of a file
    fn measure(&self, path: &Path) -> Result<LoudnessMeasurement>;

    /// Get the name of this meter (for logging)
    fn name(&self) -> &'static str;
}

/// Per-file album tag lookup
pub trait AlbumProbe: Send + Sync {
    /// Return the album tag of a file, or an empty string if it has none
    fn album(&self, path: &Path) -> Result<String>;

    /// Get the name of this probe (for logging)
    fn name(&self) -> &'static str;
}

/// Lossless stream concatenation
pub trait StreamConcatenator: Send + Sync {
    /// Stream-copy the inputs listed in `descriptor` into `output`
    ///
    /// `descriptor` is a concat list with one `file '<path>'` line per input.
    fn concatenate(&self, descriptor: &Path, output: &Path) -> Result<()>;
}

/// One metadata key/value pair handed to the tag serializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagField {
    pub key: &'static str,
    /// Empty value removes the key on copy
    pub value: String,
}

impl TagField {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Metadata serializer
pub trait TagWriter: Send + Sync {
    /// Stream-copy `source` into `output`, injecting `tags`
    ///
    /// Must not open `source` for writing.
    fn write_tags(&self, source: &Path, tags: &[TagField], output: &Path) -> Result<()>;
}
