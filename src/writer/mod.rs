//! Atomic metadata writer
//!
//! Per track: build the tag set, have the serializer stream-copy the original
//! into a sibling temp file with the tags injected, then swap the copy into
//! place (see [`swap`]). The original is only ever renamed, never opened for
//! writing.

pub mod swap;
pub mod tags;

pub use swap::{restore_backup, sibling_path, swap_in_place, BACKUP_PREFIX, TEMP_PREFIX};
pub use tags::tag_fields_for;

use crate::analysis::traits::TagWriter;
use crate::error::{ReplaytagError, Result};
use crate::types::{ScanResult, TagMode, TagScope};
use tracing::debug;

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Tag mode says leave files alone; the serializer was not invoked
    Skipped,
}

/// Writes one scope's tags under one tag mode
pub struct MetadataWriter<'a> {
    serializer: &'a dyn TagWriter,
    mode: TagMode,
    scope: TagScope,
}

impl<'a> MetadataWriter<'a> {
    pub fn new(serializer: &'a dyn TagWriter, mode: TagMode, scope: TagScope) -> Self {
        Self {
            serializer,
            mode,
            scope,
        }
    }

    /// Retag the file named by `result.file_path`
    pub fn write(&self, result: &ScanResult) -> Result<WriteOutcome> {
        let original = result.file_path.as_path();

        let Some(fields) = tag_fields_for(self.mode, self.scope, result) else {
            return Ok(WriteOutcome::Skipped);
        };

        if !original.is_file() {
            return Err(ReplaytagError::FileNotFound(original.to_path_buf()));
        }

        let temp = sibling_path(original, TEMP_PREFIX);
        debug!(
            "Writing {} {} tags for {} via {}",
            fields.len(),
            self.scope.as_str(),
            original.display(),
            temp.display()
        );

        if let Err(e) = self.serializer.write_tags(original, &fields, &temp) {
            swap::discard(&temp);
            return Err(match e {
                ReplaytagError::TagWriteFailure { reason, .. } => ReplaytagError::TagWriteFailure {
                    path: original.to_path_buf(),
                    reason,
                },
                other => other,
            });
        }

        swap_in_place(original, &temp)?;

        Ok(WriteOutcome::Written)
    }
}
