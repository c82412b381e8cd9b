//! Parser for the ffmpeg `ebur128` filter report
//!
//! With `framelog=verbose` the filter prints one line per analysis window
//! followed by a summary block. The same labels appear in both, so the last
//! occurrence of each value is the summary.

use crate::error::{ReplaytagError, Result};
use crate::types::{Decibel, LoudnessMeasurement, LoudnessUnit};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static INTEGRATED_LOUDNESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"I:\s*(-?\d+(?:\.\d+)?)\s+LUFS").expect("valid regex"));
static LOUDNESS_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"LRA:\s*(-?\d+(?:\.\d+)?)\s+LU\b").expect("valid regex"));
static TRUE_PEAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Peak:\s*(-?\d+(?:\.\d+)?)\s+dBFS").expect("valid regex"));

/// Extract the summary measurement from a report
///
/// Fails if any of the three values is missing; partial results are not
/// accepted.
pub fn parse_report(report: &str, path: &Path) -> Result<LoudnessMeasurement> {
    let integrated = last_value(report, &INTEGRATED_LOUDNESS, path, "integrated loudness")?;
    let range = last_value(report, &LOUDNESS_RANGE, path, "loudness range")?;
    let peak = last_value(report, &TRUE_PEAK, path, "true peak")?;

    Ok(LoudnessMeasurement {
        integrated_loudness: LoudnessUnit(integrated),
        loudness_range: LoudnessUnit(range),
        true_peak: Decibel(peak),
    })
}

fn last_value(report: &str, pattern: &Regex, path: &Path, field: &'static str) -> Result<f64> {
    let parse_failure = || ReplaytagError::MeasurementParseFailure {
        path: path.to_path_buf(),
        field,
    };

    let captures = pattern.captures_iter(report).last().ok_or_else(parse_failure)?;
    let value: f64 = captures[1].parse().map_err(|_| parse_failure())?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(parse_failure())
    }
}
