//! Pipeline orchestration
//!
//! Coordinates discovery, the album and track passes, and the report.
//! Each pass scans every unit through the scheduler, collects the results,
//! then retags each finished file, again one scheduled unit per file.
//! Passes run one after the other, so no two writers ever touch one path.

use crate::analysis::album::{self, AlbumScanner};
use crate::analysis::traits::AlbumProbe;
use crate::config::Settings;
use crate::discovery;
use crate::error::{ReplaytagError, Result};
use crate::export;
use crate::pipeline::scheduler::{phase_progress, Scheduler};
use crate::tools::Toolchain;
use crate::types::{ScanResult, TagScope};
use crate::writer::{MetadataWriter, WriteOutcome};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where in a pass a unit failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Write,
}

/// A unit excluded from the results, with every path it covered
#[derive(Debug)]
pub struct UnitFailure {
    pub stage: Stage,
    pub paths: Vec<PathBuf>,
    pub error: ReplaytagError,
}

/// Results of scanning one pass
#[derive(Debug, Default)]
pub struct ScanReport {
    pub results: Vec<ScanResult>,
    pub failures: Vec<UnitFailure>,
}

/// Everything that happened in one pass
#[derive(Debug)]
pub struct PassReport {
    pub scope: TagScope,
    pub results: Vec<ScanResult>,
    pub failures: Vec<UnitFailure>,
    pub written: usize,
    pub skipped: usize,
}

impl PassReport {
    pub fn failed(&self) -> usize {
        self.failures.iter().map(|f| f.paths.len()).sum()
    }
}

/// Pipeline result summary
#[derive(Debug)]
pub struct PipelineResult {
    pub total_files: usize,
    pub passes: Vec<PassReport>,
}

impl PipelineResult {
    /// Files that failed in any pass, counted once per pass
    pub fn failed(&self) -> usize {
        self.passes.iter().map(PassReport::failed).sum()
    }

    pub fn written(&self) -> usize {
        self.passes.iter().map(|p| p.written).sum()
    }

    pub fn needs_manual_recovery(&self) -> bool {
        self.passes
            .iter()
            .flat_map(|p| &p.failures)
            .any(|f| f.error.needs_manual_recovery())
    }

    fn empty() -> Self {
        Self {
            total_files: 0,
            passes: Vec::new(),
        }
    }
}

/// Run the full pipeline
pub fn run(settings: &Settings) -> Result<PipelineResult> {
    let pipeline_start = Instant::now();

    // Phase 1: Discovery
    info!("Scanning for audio files...");
    let files = discovery::scan(&settings.inputs)?;

    if files.is_empty() {
        return Ok(PipelineResult::empty());
    }

    // Dry run mode - show files and exit
    if settings.dry_run {
        return Ok(run_dry_run(&files, settings));
    }

    // Fatal preconditions before anything is scheduled
    let tools = Toolchain::locate(settings)?;

    // Phase 2: Passes
    let pipeline = Pipeline::new(settings, &tools)?;
    let result = pipeline.run(&files);

    // Phase 3: Report
    if let Some(report_path) = &settings.report {
        export::write_report(&result, report_path)?;
    }

    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );

    Ok(result)
}

/// Dry run mode - show files that would be processed without processing
fn run_dry_run(files: &[PathBuf], settings: &Settings) -> PipelineResult {
    use std::collections::BTreeMap;

    println!();
    println!("=== DRY RUN MODE ===");
    println!();

    let mut by_directory: BTreeMap<&Path, Vec<&PathBuf>> = BTreeMap::new();
    for file in files {
        let dir = file.parent().unwrap_or(file.as_path());
        by_directory.entry(dir).or_default().push(file);
    }

    for (dir, dir_files) in &by_directory {
        println!("{}/ ({} files)", dir.display(), dir_files.len());
        for file in dir_files {
            let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or("?");
            println!("  {}", filename);
        }
        println!();
    }

    println!("─────────────────────────────────────────");
    println!();
    println!("Would process {} files with {} workers:", files.len(), settings.workers_limit);
    if settings.album {
        println!("  album pass (tag mode: {})", settings.tag_mode);
    }
    if settings.track {
        println!("  track pass (tag mode: {})", settings.tag_mode);
    }
    println!();

    PipelineResult {
        total_files: files.len(),
        passes: Vec::new(),
    }
}

/// Album and track passes over a fixed set of collaborators
pub struct Pipeline<'a> {
    settings: &'a Settings,
    tools: &'a Toolchain,
    scheduler: Scheduler,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a Settings, tools: &'a Toolchain) -> Result<Self> {
        if settings.album && tools.probe.is_none() {
            return Err(ReplaytagError::ConfigError(
                "the album pass needs an album probe".to_string(),
            ));
        }

        Ok(Self {
            settings,
            tools,
            scheduler: Scheduler::new(settings.workers_limit)?,
        })
    }

    /// Run the enabled passes, album first
    pub fn run(&self, files: &[PathBuf]) -> PipelineResult {
        let mut passes = Vec::new();

        if let (true, Some(probe)) = (self.settings.album, self.tools.probe.as_deref()) {
            let scan = self.timed("Album scan", files.len(), || self.scan_albums(probe, files));
            passes.push(self.write_pass(TagScope::Album, scan));
        }

        if self.settings.track {
            let scan = self.timed("Track scan", files.len(), || self.scan_tracks(files));
            passes.push(self.write_pass(TagScope::Track, scan));
        }

        PipelineResult {
            total_files: files.len(),
            passes,
        }
    }

    fn timed<F: FnOnce() -> ScanReport>(&self, label: &str, files: usize, f: F) -> ScanReport {
        let start = Instant::now();
        let report = f();
        let elapsed = start.elapsed().as_secs_f64();
        let per_sec = if elapsed > 0.0 { files as f64 / elapsed } else { 0.0 };
        info!(
            "{} completed in {:.2}s ({:.1} tracks/sec): {} results, {} failed units",
            label,
            elapsed,
            per_sec,
            report.results.len(),
            report.failures.len()
        );
        report
    }

    /// One unit per file, each measured on its own
    pub fn scan_tracks(&self, files: &[PathBuf]) -> ScanReport {
        let progress = phase_progress(files.len(), "Scanning tracks", self.settings.show_progress);
        let meter = self.tools.meter.as_ref();
        let gain = &self.settings.gain;

        let outcomes = self
            .scheduler
            .run(files.to_vec(), files.len(), &progress, |path, tx| {
                let outcome = album::scan_track(&path, meter, gain).map_err(|error| UnitFailure {
                    stage: Stage::Scan,
                    paths: vec![path],
                    error,
                });
                let _ = tx.send(outcome);
            });

        progress.finish_and_clear();
        collect_scan(outcomes)
    }

    /// One unit per album group, each member receiving the combined values
    pub fn scan_albums(&self, probe: &dyn AlbumProbe, files: &[PathBuf]) -> ScanReport {
        let show = self.settings.show_progress;

        let progress = phase_progress(files.len(), "Reading album tags", show);
        let probed = album::probe_albums(&self.scheduler, probe, files, &progress);
        progress.finish_and_clear();

        let groups = album::group_by_album(probed);
        info!("Found {} albums in {} songs", groups.len(), files.len());

        let scanner = AlbumScanner {
            meter: self.tools.meter.as_ref(),
            concatenator: self.tools.concatenator.as_ref(),
            gain: &self.settings.gain,
            temp_dir: &self.settings.temp_dir,
        };

        let progress = phase_progress(groups.len(), "Scanning albums", show);
        let outcomes = self.scheduler.run(groups, files.len(), &progress, |group, tx| {
            match scanner.scan(&group) {
                Ok(results) => {
                    for result in results {
                        let _ = tx.send(Ok(result));
                    }
                }
                Err(error) => {
                    let _ = tx.send(Err(UnitFailure {
                        stage: Stage::Scan,
                        paths: group.tracks,
                        error,
                    }));
                }
            }
        });

        progress.finish_and_clear();
        collect_scan(outcomes)
    }

    /// Retag every scanned file of a pass
    pub fn write_pass(&self, scope: TagScope, scan: ScanReport) -> PassReport {
        let ScanReport {
            results,
            mut failures,
        } = scan;

        let writer = MetadataWriter::new(
            self.tools.tag_writer.as_ref(),
            self.settings.tag_mode,
            scope,
        );
        let progress = phase_progress(results.len(), "Writing tags", self.settings.show_progress);
        let show = self.settings.show_progress;

        let outcomes = self
            .scheduler
            .run(results.clone(), results.len(), &progress, |result, tx| {
                let outcome = writer.write(&result);
                if show {
                    progress.println(result.to_string());
                }
                let _ = tx.send(outcome.map_err(|error| UnitFailure {
                    stage: Stage::Write,
                    paths: vec![result.file_path],
                    error,
                }));
            });
        progress.finish_and_clear();

        let mut written = 0;
        let mut skipped = 0;
        for outcome in outcomes {
            match outcome {
                Ok(WriteOutcome::Written) => written += 1,
                Ok(WriteOutcome::Skipped) => skipped += 1,
                Err(failure) => {
                    log_failure(&failure);
                    failures.push(failure);
                }
            }
        }

        debug!(
            "{} pass: {} written, {} skipped, {} failed units",
            scope.as_str(),
            written,
            skipped,
            failures.len()
        );

        PassReport {
            scope,
            results,
            failures,
            written,
            skipped,
        }
    }
}

fn collect_scan(outcomes: Vec<std::result::Result<ScanResult, UnitFailure>>) -> ScanReport {
    let mut report = ScanReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(result) => report.results.push(result),
            Err(failure) => {
                log_failure(&failure);
                report.failures.push(failure);
            }
        }
    }
    report
}

fn log_failure(failure: &UnitFailure) {
    let paths = failure
        .paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    if failure.error.is_recoverable() {
        warn!("Skipping {}: {}", paths, failure.error);
    } else {
        error!("Failed {}: {}", paths, failure.error);
    }
}
