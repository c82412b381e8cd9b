//! Replace-in-place of an original file with its retagged copy
//!
//! Two renames inside the original's directory:
//!
//! 1. original → backup
//! 2. temp → original
//!
//! then the backup is removed. If step 2 fails, step 1 is reversed so the
//! original name again points at the original content.
//!
//! A crash between the two renames leaves the content only under the backup
//! name. No multi-rename transaction exists to close that window; the backup
//! prefix makes the file easy to find, and discovery warns when it sees one.

use crate::error::{ReplaytagError, Result};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Prefix of the retagged copy written next to the original
pub const TEMP_PREFIX: &str = ".replaytag-tmp-";

/// Prefix the original carries while the swap is in progress
pub const BACKUP_PREFIX: &str = ".replaytag-bak-";

/// `<dir>/<prefix><base name>` for a sibling of `original`
pub fn sibling_path(original: &Path, prefix: &str) -> PathBuf {
    let mut name = OsString::from(prefix);
    name.push(original.file_name().unwrap_or_default());
    original.with_file_name(name)
}

/// True for files this module creates transiently
pub fn is_swap_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(TEMP_PREFIX) || n.starts_with(BACKUP_PREFIX))
        .unwrap_or(false)
}

/// Swap `temp` into place at `original`
pub fn swap_in_place(original: &Path, temp: &Path) -> Result<()> {
    swap_with(original, temp, |from, to| fs::rename(from, to))
}

/// Swap with an injectable rename, so each step's failure can be exercised
pub(crate) fn swap_with<R>(original: &Path, temp: &Path, rename: R) -> Result<()>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    let backup = sibling_path(original, BACKUP_PREFIX);

    if let Err(e) = rename(original, &backup) {
        discard(temp);
        return Err(ReplaytagError::SwapFailure {
            path: original.to_path_buf(),
            source: e,
        });
    }
    debug!("Moved {} aside to {}", original.display(), backup.display());

    if let Err(swap_error) = rename(temp, original) {
        return match restore_backup_with(&backup, original, &rename) {
            Ok(()) => {
                discard(temp);
                Err(ReplaytagError::SwapFailure {
                    path: original.to_path_buf(),
                    source: swap_error,
                })
            }
            Err(recovery_error) => {
                discard(temp);
                error!(
                    "Could not restore {} from {}: {}",
                    original.display(),
                    backup.display(),
                    recovery_error
                );
                Err(ReplaytagError::RecoveryFailure {
                    path: original.to_path_buf(),
                    backup,
                    swap_error: swap_error.to_string(),
                    recovery_error: recovery_error.to_string(),
                })
            }
        };
    }

    fs::remove_file(&backup).map_err(|e| ReplaytagError::StaleBackup {
        path: original.to_path_buf(),
        backup: backup.clone(),
        source: e,
    })?;

    Ok(())
}

/// Put the backup back under the original name
pub fn restore_backup(backup: &Path, original: &Path) -> io::Result<()> {
    restore_backup_with(backup, original, &|from: &Path, to: &Path| fs::rename(from, to))
}

fn restore_backup_with<R>(backup: &Path, original: &Path, rename: &R) -> io::Result<()>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    rename(backup, original)?;
    warn!("Restored {} after a failed swap", original.display());
    Ok(())
}

/// Remove a leftover temp file, tolerating its absence
pub(crate) fn discard(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => debug!("Discarded {}", temp.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {}", temp.display(), e),
    }
}
