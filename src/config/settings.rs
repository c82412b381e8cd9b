//! Runtime configuration settings
//!
//! Built once from the CLI and passed down by reference; nothing in the
//! pipeline reads configuration from anywhere else.

use super::cli::{Cli, ProbeBackend};
use crate::analysis::gain::GainSettings;
use crate::error::{ReplaytagError, Result};
use crate::types::{Decibel, LoudnessUnit, TagMode};
use std::path::PathBuf;

/// Runtime settings for the normalization pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Files or directories to process
    pub inputs: Vec<PathBuf>,
    /// Gain parameters shared by every unit
    pub gain: GainSettings,
    /// Which tags get written
    pub tag_mode: TagMode,
    /// Run the album pass
    pub album: bool,
    /// Run the track pass
    pub track: bool,
    /// Ceiling on concurrently running units
    pub workers_limit: usize,
    /// Album tag source
    pub probe: ProbeBackend,
    /// Explicit ffmpeg binary
    pub ffmpeg: Option<PathBuf>,
    /// Explicit ffprobe binary
    pub ffprobe: Option<PathBuf>,
    /// Directory for combined album files
    pub temp_dir: PathBuf,
    /// JSON report destination
    pub report: Option<PathBuf>,
    /// Print per-track results and progress bars
    pub show_progress: bool,
    /// Dry run mode - show files without processing
    pub dry_run: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    ///
    /// Rejects an invalid tag mode here, before anything is scanned.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let tag_mode: TagMode = cli.tagmode.parse()?;

        let workers_limit = cli.workers.unwrap_or_else(default_workers);
        if workers_limit == 0 {
            return Err(ReplaytagError::ConfigError(
                "--workers must be at least 1".to_string(),
            ));
        }

        if !cli.album && !cli.track {
            return Err(ReplaytagError::ConfigError(
                "nothing to do: both --album and --track are disabled".to_string(),
            ));
        }

        Ok(Self {
            inputs: cli.inputs.clone(),
            gain: GainSettings {
                pregain: LoudnessUnit(cli.pregain),
                peak_limit: Decibel(cli.maxtpl),
                prevent_clipping: cli.noclip,
                ..GainSettings::default()
            },
            tag_mode,
            album: cli.album,
            track: cli.track,
            workers_limit,
            probe: cli.probe,
            ffmpeg: cli.ffmpeg.clone(),
            ffprobe: cli.ffprobe.clone(),
            temp_dir: cli.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            report: cli.report.clone(),
            show_progress: !cli.quiet,
            dry_run: cli.dry_run,
        })
    }
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inputs: vec![PathBuf::from(".")],
            gain: GainSettings::default(),
            tag_mode: TagMode::Skip,
            album: false,
            track: true,
            workers_limit: default_workers(),
            probe: ProbeBackend::Ffprobe,
            ffmpeg: None,
            ffprobe: None,
            temp_dir: std::env::temp_dir(),
            report: None,
            show_progress: true,
            dry_run: false,
        }
    }
}
