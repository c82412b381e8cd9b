//! Loudness analysis
//!
//! The gain math is pure. Measurement, album lookup and stream concatenation
//! sit behind traits so the pipeline can run against stub backends.

pub mod album;
pub mod ebur128;
pub mod gain;
pub mod traits;

pub use album::{group_by_album, probe_albums, scan_track, AlbumGroup, AlbumScanner};
pub use gain::{calculate_track_gain, prevent_clipping, GainSettings};
pub use traits::{AlbumProbe, LoudnessMeter, StreamConcatenator, TagField, TagWriter};
