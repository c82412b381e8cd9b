//! JSON run report for interoperability with other tools

use crate::error::{ReplaytagError, Result};
use crate::pipeline::{PassReport, PipelineResult, Stage, UnitFailure};
use crate::types::ScanResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportJson {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ReportMetadata,
    /// One entry per pass that ran, album first
    pub passes: Vec<PassJson>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// replaytag version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
    pub total_files: usize,
    pub failed_files: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PassJson {
    /// "track" or "album"
    pub scope: String,
    pub written: usize,
    pub skipped: usize,
    pub results: Vec<ScanResult>,
    #[serde(default)]
    pub failures: Vec<FailureJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureJson {
    /// "scan" or "write"
    pub stage: String,
    pub paths: Vec<String>,
    pub error: String,
    /// Set when a file may only survive in its backup
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_manual_recovery: bool,
}

/// Write the run report to a JSON file
///
/// Written to a sibling temp file first, then renamed over the target.
pub fn write_report(result: &PipelineResult, output_path: &Path) -> Result<()> {
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| ReplaytagError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let output = ReportJson {
        version: SCHEMA_VERSION.to_string(),
        metadata: ReportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            total_files: result.total_files,
            failed_files: result.failed(),
        },
        passes: result.passes.iter().map(pass_to_json).collect(),
    };

    serde_json::to_writer_pretty(BufWriter::new(file), &output).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        ReplaytagError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        ReplaytagError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!("Wrote report for {} files to {}", result.total_files, output_path.display());

    Ok(())
}

/// Read a report written by [`write_report`]
pub fn read_report(path: &Path) -> Result<ReportJson> {
    let file = File::open(path).map_err(|e| ReplaytagError::output_error(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ReplaytagError::OutputError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn pass_to_json(pass: &PassReport) -> PassJson {
    PassJson {
        scope: pass.scope.as_str().to_string(),
        written: pass.written,
        skipped: pass.skipped,
        results: pass.results.clone(),
        failures: pass.failures.iter().map(failure_to_json).collect(),
    }
}

fn failure_to_json(failure: &UnitFailure) -> FailureJson {
    FailureJson {
        stage: match failure.stage {
            Stage::Scan => "scan",
            Stage::Write => "write",
        }
        .to_string(),
        paths: failure
            .paths
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        error: failure.error.to_string(),
        needs_manual_recovery: failure.error.needs_manual_recovery(),
    }
}
