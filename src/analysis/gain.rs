//! ReplayGain 2.0 gain calculation
//!
//! Track Gain = Reference Level - Integrated Loudness + Pre-gain
//!
//! With clip prevention enabled, the gain is lowered just enough that the
//! true peak after applying it lands exactly on the configured limit.

use crate::types::{Decibel, LoudnessMeasurement, LoudnessUnit, ScanResult};
use std::path::Path;

/// ReplayGain 2.0 reference level
pub const REFERENCE_LOUDNESS_LUFS: f64 = -18.0;

/// Default true peak ceiling used by clip prevention
pub const DEFAULT_PEAK_LIMIT_DBTP: f64 = -1.0;

/// Gain derived from measured loudness relative to the reference level
pub fn calculate_track_gain(
    loudness: LoudnessUnit,
    reference_loudness: LoudnessUnit,
    pregain: LoudnessUnit,
) -> LoudnessUnit {
    reference_loudness - loudness + pregain
}

/// Lower `gain` if applying it would push `true_peak` above `peak_limit`
///
/// The reduction is the excess expressed in the log domain, so the corrected
/// peak equals the limit rather than undershooting it. A gain that already
/// respects the limit is returned unchanged, which makes this idempotent.
pub fn prevent_clipping(
    true_peak: Decibel,
    gain: LoudnessUnit,
    peak_limit: Decibel,
) -> LoudnessUnit {
    let peak_after_gain = gain.to_linear() * true_peak.to_linear();
    let limit = peak_limit.to_linear();

    if peak_after_gain > limit {
        gain - (peak_after_gain / limit).to_loudness_unit()
    } else {
        gain
    }
}

/// Gain parameters, fixed for a whole run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainSettings {
    pub reference_loudness: LoudnessUnit,
    pub pregain: LoudnessUnit,
    pub peak_limit: Decibel,
    /// Applied to every track of the run or to none
    pub prevent_clipping: bool,
}

impl Default for GainSettings {
    fn default() -> Self {
        Self {
            reference_loudness: LoudnessUnit(REFERENCE_LOUDNESS_LUFS),
            pregain: LoudnessUnit(0.0),
            peak_limit: Decibel(DEFAULT_PEAK_LIMIT_DBTP),
            prevent_clipping: false,
        }
    }
}

impl GainSettings {
    /// Final gain for one measurement
    pub fn gain_for(&self, measurement: &LoudnessMeasurement) -> LoudnessUnit {
        let gain = calculate_track_gain(
            measurement.integrated_loudness,
            self.reference_loudness,
            self.pregain,
        );

        if self.prevent_clipping {
            prevent_clipping(measurement.true_peak, gain, self.peak_limit)
        } else {
            gain
        }
    }

    /// Build the scan result for a measured file
    pub fn scan_result(&self, path: &Path, measurement: &LoudnessMeasurement) -> ScanResult {
        ScanResult {
            file_path: path.to_path_buf(),
            track_gain: self.gain_for(measurement).to_decibels(),
            track_range: measurement.loudness_range.to_decibels(),
            reference_loudness: self.reference_loudness,
            track_peak: measurement.true_peak.to_linear(),
            loudness: measurement.integrated_loudness,
        }
    }
}
