//! Core data types for replaytag
//!
//! These types represent the domain model and flow through the pipeline:
//! the three loudness scales, a parsed measurement, the per-track scan
//! result and the tag policy enums.

use crate::error::{ReplaytagError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// =============================================================================
// Loudness scales
// =============================================================================

/// Logarithmic level on the dBFS / dBTP scale
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decibel(pub f64);

/// Logarithmic level on the LU / LUFS scale
///
/// Numerically identical to [`Decibel`]; the distinction is only which
/// reference the number is relative to.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoudnessUnit(pub f64);

/// Linear amplitude ratio, 1.0 being full scale
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinearLoudness(pub f64);

impl Decibel {
    /// `10^(dB/20)`
    pub fn to_linear(self) -> LinearLoudness {
        LinearLoudness(10f64.powf(self.0 / 20.0))
    }

    pub fn to_loudness_unit(self) -> LoudnessUnit {
        LoudnessUnit(self.0)
    }
}

impl LoudnessUnit {
    pub fn to_decibels(self) -> Decibel {
        Decibel(self.0)
    }

    pub fn to_linear(self) -> LinearLoudness {
        self.to_decibels().to_linear()
    }
}

impl LinearLoudness {
    /// `20·log10(linear)`
    ///
    /// Silence (0.0) maps to negative infinity rather than an error.
    pub fn to_decibels(self) -> Decibel {
        Decibel(20.0 * self.0.log10())
    }

    pub fn to_loudness_unit(self) -> LoudnessUnit {
        self.to_decibels().to_loudness_unit()
    }
}

macro_rules! log_scale_ops {
    ($ty:ident) => {
        impl Add for $ty {
            type Output = $ty;
            fn add(self, rhs: $ty) -> $ty {
                $ty(self.0 + rhs.0)
            }
        }

        impl Sub for $ty {
            type Output = $ty;
            fn sub(self, rhs: $ty) -> $ty {
                $ty(self.0 - rhs.0)
            }
        }

        impl Neg for $ty {
            type Output = $ty;
            fn neg(self) -> $ty {
                $ty(-self.0)
            }
        }
    };
}

log_scale_ops!(Decibel);
log_scale_ops!(LoudnessUnit);

impl Mul for LinearLoudness {
    type Output = LinearLoudness;
    fn mul(self, rhs: LinearLoudness) -> LinearLoudness {
        LinearLoudness(self.0 * rhs.0)
    }
}

impl Div for LinearLoudness {
    type Output = LinearLoudness;
    fn div(self, rhs: LinearLoudness) -> LinearLoudness {
        LinearLoudness(self.0 / rhs.0)
    }
}

impl fmt::Display for Decibel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} dB", self.0)
    }
}

impl fmt::Display for LoudnessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} LU", self.0)
    }
}

impl fmt::Display for LinearLoudness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

// =============================================================================
// Measurement and scan results
// =============================================================================

/// Summary values from one run of the loudness meter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessMeasurement {
    /// Integrated loudness (LUFS)
    pub integrated_loudness: LoudnessUnit,
    /// Loudness range (LU)
    pub loudness_range: LoudnessUnit,
    /// True peak (dBFS)
    pub true_peak: Decibel,
}

/// Finished gain computation for one file, ready to be written as tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub file_path: PathBuf,
    pub track_gain: Decibel,
    pub track_range: Decibel,
    pub reference_loudness: LoudnessUnit,
    pub track_peak: LinearLoudness,
    pub loudness: LoudnessUnit,
}

impl ScanResult {
    /// Same numbers, attributed to another file
    ///
    /// Used by album mode, where every member carries the combined values.
    pub fn for_member(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filepath: {}", self.file_path.display())?;
        writeln!(f, "Loudness: {:8.2} LUFS", self.loudness.0)?;
        writeln!(f, "Range: {:>12}", self.track_range.to_string())?;
        writeln!(
            f,
            "Peak: {:14.6} ({:.2} dBTP)",
            self.track_peak.0,
            self.track_peak.to_decibels().0
        )?;
        writeln!(f, "Gain: {:>14}", self.track_gain.to_string())
    }
}

// =============================================================================
// Tag policy
// =============================================================================

/// Which ReplayGain fields get written to each file
///
/// Parsed once per run from the `--tagmode` letter. Unknown letters are
/// rejected by [`TagMode::from_str`] with [`ReplaytagError::InvalidTagMode`],
/// so an invalid mode never reaches the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMode {
    /// Strip ReplayGain tags (`d`)
    Delete,
    /// Gain and peak (`i`)
    WriteStandard,
    /// Gain, peak, reference loudness and range (`e`)
    WriteExtra,
    /// Like `WriteExtra` with gain and range in LU (`l`)
    WriteExtraLU,
    /// Leave files alone (`s`)
    Skip,
}

impl FromStr for TagMode {
    type Err = ReplaytagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "d" | "delete" => Ok(TagMode::Delete),
            "i" | "standard" => Ok(TagMode::WriteStandard),
            "e" | "extra" => Ok(TagMode::WriteExtra),
            "l" | "extra-lu" => Ok(TagMode::WriteExtraLU),
            "s" | "skip" => Ok(TagMode::Skip),
            other => Err(ReplaytagError::InvalidTagMode(other.to_string())),
        }
    }
}

impl fmt::Display for TagMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagMode::Delete => "delete",
            TagMode::WriteStandard => "standard",
            TagMode::WriteExtra => "extra",
            TagMode::WriteExtraLU => "extra-lu",
            TagMode::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// Whether values describe a single track or a whole album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagScope {
    Track,
    Album,
}

impl TagScope {
    pub fn as_str(self) -> &'static str {
        match self {
            TagScope::Track => "track",
            TagScope::Album => "album",
        }
    }
}

// =============================================================================
// Supported formats
// =============================================================================

/// Container/format extensions accepted as tracks
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "aiff", "aif", "alfc", "ape", "apl", "bwf", "flac", "mp3", "mp4", "m4a", "m4b", "m4p",
    "m4r", "mpc", "ogg", "tta", "wma", "wv",
];

/// Lowercased extension of a path, if it has one
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Check if a path has a supported extension
pub fn is_supported_path(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Validate a track path against the extension allow-list
pub fn check_extension(path: &Path) -> Result<()> {
    if is_supported_path(path) {
        Ok(())
    } else {
        Err(ReplaytagError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension: extension_of(path).unwrap_or_else(|| "none".to_string()),
        })
    }
}
