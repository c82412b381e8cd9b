//! Unified error types for replaytag
//!
//! Error strategy:
//! - Per-unit errors (probe, measurement, album group, single write): recoverable,
//!   logged and reported, the batch continues
//! - Run-level errors (tag mode, missing tools, output): fatal, abort before or
//!   instead of scheduling
//!
//! A failed rollback is its own variant and is never retried.

use std::path::PathBuf;
use thiserror::Error;

/// Supported formats for helpful error messages
pub const SUPPORTED_FORMATS: &str =
    "AIFF, APE, BWF, FLAC, MP3, MP4/M4A, MPC, OGG, TTA, WMA, WavPack";

/// Top-level error type for replaytag operations
#[derive(Debug, Error)]
pub enum ReplaytagError {
    // =========================================================================
    // Recoverable errors - exclude the unit, continue batch
    // =========================================================================
    #[error("Unsupported file format for '{path}': {extension}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedExtension { path: PathBuf, extension: String },

    #[error("Failed to read album tag from '{path}': {reason}")]
    ProbeFailure { path: PathBuf, reason: String },

    #[error("Loudness measurement failed for '{path}': {reason}")]
    MeasurementFailure { path: PathBuf, reason: String },

    #[error("Could not parse loudness report for '{path}': missing or invalid {field}")]
    MeasurementParseFailure { path: PathBuf, field: &'static str },

    #[error("Album '{album}' mixes file formats ({extensions})\n  Tip: album gain across multiple file types is not supported; convert the album to one format")]
    MixedFormatInAlbum { album: String, extensions: String },

    #[error("Path '{0}' is not valid UTF-8 and cannot be listed for concatenation")]
    NonUtf8Path(PathBuf),

    #[error("Failed to concatenate album '{album}': {reason}")]
    ConcatenationFailure { album: String, reason: String },

    #[error("Failed to write tags for '{path}': {reason}\n  Original file was not modified")]
    TagWriteFailure { path: PathBuf, reason: String },

    #[error("Failed to swap retagged copy into place for '{path}': {source}\n  Original file was restored")]
    SwapFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The swap failed and putting the original back failed as well.
    /// The original content is only reachable under `backup`.
    #[error("RECOVERY FAILED for '{path}': swap failed ({swap_error}) and restoring the backup failed ({recovery_error})\n  Original content is at '{backup}'; rename it back manually")]
    RecoveryFailure {
        path: PathBuf,
        backup: PathBuf,
        swap_error: String,
        recovery_error: String,
    },

    #[error("Retagged '{path}' but could not remove backup '{backup}': {source}")]
    StaleBackup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Fatal errors - abort entire run
    // =========================================================================
    #[error("Invalid tag mode '{0}'\n  Valid modes: d (delete), i (standard), e (extra), l (extra, LU units), s (skip)")]
    InvalidTagMode(String),

    #[error("Required tool '{name}' not found{location}\n  Tip: install ffmpeg (which ships ffprobe) or pass its path with --{name}")]
    ToolNotFound { name: &'static str, location: String },

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for replaytag operations
pub type Result<T> = std::result::Result<T, ReplaytagError>;

impl ReplaytagError {
    /// Returns true if this error only affects one unit (should skip it, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReplaytagError::UnsupportedExtension { .. }
                | ReplaytagError::ProbeFailure { .. }
                | ReplaytagError::MeasurementFailure { .. }
                | ReplaytagError::MeasurementParseFailure { .. }
                | ReplaytagError::MixedFormatInAlbum { .. }
                | ReplaytagError::NonUtf8Path(_)
                | ReplaytagError::ConcatenationFailure { .. }
                | ReplaytagError::TagWriteFailure { .. }
                | ReplaytagError::SwapFailure { .. }
                | ReplaytagError::StaleBackup { .. }
                | ReplaytagError::FileNotFound(_)
        )
    }

    /// Returns true if the original file may no longer be reachable under its name
    pub fn needs_manual_recovery(&self) -> bool {
        matches!(self, ReplaytagError::RecoveryFailure { .. })
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "Directory does not exist: {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        ReplaytagError::OutputError { path, reason }
    }

    /// Create a measurement failure from the meter's diagnostic output
    pub fn measurement_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ReplaytagError::MeasurementFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a probe failure from the probe's diagnostic output
    pub fn probe_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ReplaytagError::ProbeFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
