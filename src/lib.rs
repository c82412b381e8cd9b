//! replaytag - ReplayGain 2.0 scanner and tagger
//!
//! A command-line utility that measures EBU R128 loudness of audio files,
//! derives track and album gain, and writes ReplayGain tags back into the
//! files without ever leaving a half-written original behind.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `types`: loudness scales, scan results and tag policy
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: recursive file scanning with the extension allow-list
//! - `analysis`: gain math, album grouping and the collaborator traits
//! - `tools`: ffmpeg/ffprobe backed collaborators
//! - `pipeline`: bounded parallel scheduling and pass orchestration
//! - `writer`: tag field selection and the copy-and-swap file update
//! - `export`: JSON run report
//!
//! # Example
//!
//! ```no_run
//! use replaytag::{config::Settings, pipeline};
//!
//! let settings = Settings::default();
//! let result = pipeline::run(&settings).expect("Scan failed");
//! println!("Tagged {} files", result.written());
//! ```

pub mod analysis;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod tools;
pub mod types;
pub mod writer;

// Re-export key types at crate root
pub use error::{ReplaytagError, Result};
pub use types::{
    Decibel, LinearLoudness, LoudnessMeasurement, LoudnessUnit, ScanResult, TagMode, TagScope,
};
