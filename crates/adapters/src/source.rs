//! Re-reading resolved documents from disk.
//!
//! Projectors never trust the in-memory body of a resolved document: they read the
//! winning file again so the artifact reflects exactly what is on disk.

use capforge_catalog::{CapabilityDocument, Metadata, parse_strict};
use capforge_core::{ErrorRecord, Guarded, Result, RetryPolicy, fsops, guard};

use crate::Target;

/// A document together with its freshly read source
#[derive(Debug, Clone)]
pub(crate) struct Source<'a> {
    pub doc: &'a CapabilityDocument,
    /// Raw file content, byte for byte
    pub raw: String,
    pub metadata: Metadata,
    pub body: String,
}

/// Read and strictly parse each document. Recoverable failures are logged, recorded
/// and skipped; anything else aborts.
pub(crate) fn load_sources<'a>(
    target: Target, documents: impl IntoIterator<Item = &'a CapabilityDocument>, retry: &RetryPolicy,
) -> Result<(Vec<Source<'a>>, Vec<ErrorRecord>)> {
    let mut sources = Vec::new();
    let mut skipped = Vec::new();

    for doc in documents {
        let loaded = guard(|| {
            let raw = fsops::read_to_string(&doc.source_path, retry)?;
            let (metadata, body) = parse_strict(&raw).map_err(|e| e.with_path(&doc.source_path))?;
            Ok(Source { doc, raw, metadata, body })
        })?;

        match loaded {
            Guarded::Done(source) => sources.push(source),
            Guarded::Skipped(record) => {
                tracing::warn!(target_tool = %target, name = %doc.name, "skipping capability");
                skipped.push(record.with_context("target", target.as_str()).with_context("name", doc.name.as_str()));
            }
        }
    }

    Ok((sources, skipped))
}

/// Body without the blank lines that usually separate it from the metadata block.
pub(crate) fn trimmed_body(body: &str) -> &str {
    body.trim_start_matches(['\r', '\n'])
}
