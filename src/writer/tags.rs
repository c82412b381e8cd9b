//! ReplayGain tag sets per tag mode and scope
//!
//! Key names follow the ReplayGain 2.0 convention used by Vorbis comments,
//! APE tags and ID3v2 TXXX frames (ffmpeg maps them per container).

use crate::analysis::traits::TagField;
use crate::types::{ScanResult, TagMode, TagScope};

pub const REFERENCE_LOUDNESS_KEY: &str = "REPLAYGAIN_REFERENCE_LOUDNESS";

struct ScopeKeys {
    gain: &'static str,
    peak: &'static str,
    range: &'static str,
}

const TRACK_KEYS: ScopeKeys = ScopeKeys {
    gain: "REPLAYGAIN_TRACK_GAIN",
    peak: "REPLAYGAIN_TRACK_PEAK",
    range: "REPLAYGAIN_TRACK_RANGE",
};

const ALBUM_KEYS: ScopeKeys = ScopeKeys {
    gain: "REPLAYGAIN_ALBUM_GAIN",
    peak: "REPLAYGAIN_ALBUM_PEAK",
    range: "REPLAYGAIN_ALBUM_RANGE",
};

fn keys_for(scope: TagScope) -> &'static ScopeKeys {
    match scope {
        TagScope::Track => &TRACK_KEYS,
        TagScope::Album => &ALBUM_KEYS,
    }
}

/// Ordered tags to inject for one result, or `None` when nothing is written
pub fn tag_fields_for(
    mode: TagMode,
    scope: TagScope,
    result: &ScanResult,
) -> Option<Vec<TagField>> {
    let keys = keys_for(scope);

    let gain_db = format!("{:.2} dB", result.track_gain.0);
    let gain_lu = format!("{:.2} LU", result.track_gain.to_loudness_unit().0);
    let peak = format!("{:.6}", result.track_peak.0);
    let reference = format!("{:.2} LUFS", result.reference_loudness.0);
    let range_db = format!("{:.2} dB", result.track_range.0);
    let range_lu = format!("{:.2} LU", result.track_range.to_loudness_unit().0);

    let fields = match mode {
        TagMode::Skip => return None,
        // Empty values make the serializer drop the keys on copy
        TagMode::Delete => vec![
            TagField::new(keys.gain, ""),
            TagField::new(keys.peak, ""),
            TagField::new(REFERENCE_LOUDNESS_KEY, ""),
            TagField::new(keys.range, ""),
        ],
        TagMode::WriteStandard => vec![
            TagField::new(keys.gain, gain_db),
            TagField::new(keys.peak, peak),
        ],
        TagMode::WriteExtra => vec![
            TagField::new(keys.gain, gain_db),
            TagField::new(keys.peak, peak),
            TagField::new(REFERENCE_LOUDNESS_KEY, reference),
            TagField::new(keys.range, range_db),
        ],
        TagMode::WriteExtraLU => vec![
            TagField::new(keys.gain, gain_lu),
            TagField::new(keys.peak, peak),
            TagField::new(REFERENCE_LOUDNESS_KEY, reference),
            TagField::new(keys.range, range_lu),
        ],
    };

    Some(fields)
}
