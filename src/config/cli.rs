//! CLI argument parsing and configuration

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Where album names come from when grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProbeBackend {
    /// Run ffprobe on each file
    Ffprobe,
    /// Read tags in-process
    Tags,
}

/// replaytag - ReplayGain 2.0 scanner and tagger
///
/// Measures EBU R128 loudness with ffmpeg, computes track and album gain,
/// and writes ReplayGain tags back into the files through a crash-safe
/// copy-and-swap.
#[derive(Parser, Debug)]
#[command(name = "replaytag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Audio files or directories (scanned recursively)
    #[arg(value_name = "PATH", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Maximal true peak level in dBTP (used with --noclip)
    #[arg(long, value_name = "DBTP", default_value_t = -1.0, allow_negative_numbers = true)]
    pub maxtpl: f64,

    /// Apply n dB/LU pre-gain value
    #[arg(long, value_name = "DB", default_value_t = 0.0, allow_negative_numbers = true)]
    pub pregain: f64,

    /// Number of files processed in parallel (defaults to CPU count)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Lower track gain to avoid clipping
    #[arg(long, default_value = "false")]
    pub noclip: bool,

    /// Also calculate ReplayGain values for albums
    #[arg(short, long, default_value = "false")]
    pub album: bool,

    /// Calculate ReplayGain values for tracks
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub track: bool,

    /// Tag mode: d = delete, i = ReplayGain 2.0 tags, e = plus reference and
    /// range, l = like e in LU units, s = don't write tags
    #[arg(long, value_name = "MODE", default_value = "s")]
    pub tagmode: String,

    /// Album tag source used for grouping
    #[arg(long, value_enum, default_value_t = ProbeBackend::Ffprobe)]
    pub probe: ProbeBackend,

    /// Path to the ffmpeg binary (defaults to PATH lookup)
    #[arg(long, value_name = "FILE")]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary (defaults to PATH lookup)
    #[arg(long, value_name = "FILE")]
    pub ffprobe: Option<PathBuf>,

    /// Directory for temporary combined album files
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Write a JSON report of all results and failures
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress per-track output and progress bars
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,

    /// Dry run - show files that would be processed without touching them
    #[arg(long, default_value = "false")]
    pub dry_run: bool,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
