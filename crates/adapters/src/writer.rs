//! Writing projected artifacts to an output directory.

use capforge_core::{Guarded, Result, RetryPolicy, fsops, guard, log_error};
use serde::Serialize;
use std::path::Path;

use crate::projector::AdapterArtifact;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WriteOptions {
    /// Replace existing files whose content differs
    pub force: bool,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub written: usize,
    /// Already present with identical content
    pub unchanged: usize,
    /// Present with different content and not forced, or unreadable
    pub skipped: usize,
}

impl WriteSummary {
    pub fn total(&self) -> usize {
        self.written + self.unchanged + self.skipped
    }
}

/// Write `artifacts` under `root`, creating directories as needed.
///
/// A failed write aborts the run; nothing is rolled back.
pub fn write_artifacts(root: &Path, artifacts: &[AdapterArtifact], options: &WriteOptions) -> Result<WriteSummary> {
    let mut summary = WriteSummary::default();

    for artifact in artifacts {
        let path = root.join(&artifact.relative_path);

        let existing = if path.is_file() {
            match guard(|| fsops::read_to_string(&path, &options.retry))? {
                Guarded::Done(existing) => Some(existing),
                Guarded::Skipped(_) => {
                    summary.skipped += 1;
                    continue;
                }
            }
        } else {
            None
        };

        match existing {
            Some(current) if current == artifact.content => {
                tracing::debug!(path = %path.display(), "artifact unchanged");
                summary.unchanged += 1;
                continue;
            }
            Some(_) if !options.force => {
                tracing::warn!(path = %path.display(), "artifact differs from existing file, skipping (use --force to overwrite)");
                summary.skipped += 1;
                continue;
            }
            _ => {}
        }

        fsops::write(&path, &artifact.content, &options.retry).inspect_err(|e| {
            log_error(e);
        })?;
        tracing::debug!(path = %path.display(), target_tool = %artifact.target, "artifact written");
        summary.written += 1;
    }

    tracing::info!(
        root = %root.display(),
        written = summary.written,
        unchanged = summary.unchanged,
        skipped = summary.skipped,
        "artifacts written"
    );
    Ok(summary)
}
