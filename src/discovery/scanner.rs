//! File discovery and scanning

use crate::error::{ReplaytagError, Result};
use crate::types::check_extension;
use crate::writer::swap::{is_swap_artifact, BACKUP_PREFIX};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Collect audio files from every input (file or directory)
///
/// Directories are walked recursively and filtered by the extension
/// allow-list. An explicitly named file must itself be supported. Paths are
/// deduplicated while keeping first-seen order.
pub fn scan(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for input in inputs {
        for path in scan_one(input)? {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    info!("Discovered {} audio files", files.len());

    Ok(files)
}

fn scan_one(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        return Err(ReplaytagError::FileNotFound(input.to_path_buf()));
    }

    if input.is_file() {
        check_extension(input)?;
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(input).sort_by_file_name();

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if is_swap_artifact(path) {
            if is_leftover_backup(path) {
                warn!(
                    "Found {} left by an interrupted swap; the original content may be in it",
                    path.display()
                );
            }
            continue;
        }

        if check_extension(path).is_ok() {
            debug!("Discovered: {}", path.display());
            files.push(path.to_path_buf());
        }
    }

    if files.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    Ok(files)
}

fn is_leftover_backup(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(BACKUP_PREFIX))
        .unwrap_or(false)
}
