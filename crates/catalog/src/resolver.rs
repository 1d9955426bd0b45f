//! Capability discovery and tier resolution.
//!
//! Each precedence root holds `workflows/` and `agents/`, either flat or with one level
//! of category subdirectories:
//!
//! ```text
//! <root>/workflows/plan.md
//! <root>/agents/review/security-sentinel.md
//! ```
//!
//! Tiers merge from lowest precedence to highest, so the highest-precedence document
//! with a given logical name survives in full (body, metadata and category).

use crate::parser::{parse_strict, validate_required_fields};
use crate::types::{
    CapabilityDocument, CapabilityKey, CapabilityKind, Resolution, ResolvedCapabilitySet, Tier, TierRoot, UNCATEGORIZED,
};
use capforge_core::{
    CapabilityLookupError, Config, Error, ErrorRecord, FileOp, Guarded, Result, RetryPolicy, fsops, guard, log_error,
};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Walk and category settings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Known category names
    pub categories: Vec<String>,
    /// Document file extension, without the dot
    pub extension: String,
    pub retry: RetryPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ResolverOptions {
    fn from(config: &Config) -> Self {
        Self {
            categories: config.resolver.categories.clone(),
            extension: config.resolver.extension.clone(),
            retry: config.retry,
        }
    }
}

/// A file found during the walk, with the directory segments between the kind
/// directory and the file.
#[derive(Debug, Clone)]
struct Candidate {
    kind: CapabilityKind,
    path: PathBuf,
    segments: Vec<String>,
}

/// Resolves capability documents across an explicit, ordered list of roots.
#[derive(Debug, Clone)]
pub struct Resolver {
    /// Highest precedence first
    roots: Vec<TierRoot>,
    options: ResolverOptions,
}

impl Resolver {
    /// Create a resolver over `roots`, highest precedence first.
    pub fn new(roots: Vec<TierRoot>, options: ResolverOptions) -> Result<Self> {
        if roots.is_empty() {
            return Err(Error::critical("resolver needs at least one precedence root"));
        }
        if roots.windows(2).any(|pair| pair[0].tier >= pair[1].tier) {
            return Err(Error::critical("precedence roots must be ordered project, user, package without repeats"));
        }
        Ok(Self { roots, options })
    }

    /// Resolver over the three configured roots.
    pub fn from_config(config: &Config, base: &Path) -> Result<Self> {
        let paths = config.roots.resolve(base)?;
        Self::new(TierRoot::from_paths(&paths), ResolverOptions::from(config))
    }

    pub fn roots(&self) -> &[TierRoot] {
        &self.roots
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve the effective set, optionally restricted to one category.
    pub fn resolve(&self, category: Option<&str>) -> Result<ResolvedCapabilitySet> {
        self.resolve_report(category).map(|resolution| resolution.set)
    }

    /// Resolve and report every document that had to be skipped.
    pub fn resolve_report(&self, category: Option<&str>) -> Result<Resolution> {
        let mut skipped = Vec::new();
        let mut scanned = 0;
        let mut tiers = Vec::with_capacity(self.roots.len());

        for root in &self.roots {
            let (documents, seen) = self.scan_tier(root, &mut skipped)?;
            scanned += seen;
            tiers.push((root.tier, documents));
        }

        let mut merged: BTreeMap<CapabilityKey, CapabilityDocument> = BTreeMap::new();
        for (tier, documents) in tiers.into_iter().rev() {
            for (key, doc) in documents {
                if let Some(previous) = merged.insert(key, doc) {
                    tracing::debug!(
                        name = %previous.name,
                        kind = %previous.kind,
                        overridden = %previous.tier,
                        by = %tier,
                        "capability overridden by higher tier"
                    );
                }
            }
        }

        let set = ResolvedCapabilitySet::from_entries(merged);
        let set = match category {
            Some(category) => set.filter_category(&self.canonical_category(category)),
            None => set,
        };

        tracing::info!(merged = set.len(), scanned, skipped = skipped.len(), "resolved capabilities");
        Ok(Resolution { set, skipped, scanned })
    }

    /// Load every document of one tier. A missing root is fatal for the resolution;
    /// individual documents that fail are recorded and skipped.
    fn scan_tier(
        &self, root: &TierRoot, skipped: &mut Vec<ErrorRecord>,
    ) -> Result<(BTreeMap<CapabilityKey, CapabilityDocument>, usize)> {
        if !root.path.is_dir() {
            let err = Error::file_op(
                FileOp::ReadDir,
                &root.path,
                io::Error::new(io::ErrorKind::NotFound, format!("{} root does not exist", root.tier)),
            );
            log_error(&err);
            return Err(err);
        }

        let candidates = self.candidates(root, skipped)?;
        let seen = candidates.len();
        let mut documents = BTreeMap::new();

        for candidate in candidates {
            match guard(|| self.load_document(root.tier, &candidate))? {
                Guarded::Done(doc) => {
                    if let Some(previous) = documents.insert(doc.key(), doc) {
                        tracing::warn!(
                            name = %previous.name,
                            tier = %root.tier,
                            replaced = %previous.source_path.display(),
                            "duplicate capability name within one tier"
                        );
                    }
                }
                Guarded::Skipped(record) => skipped.push(record.with_context("tier", root.tier.as_str())),
            }
        }

        Ok((documents, seen))
    }

    /// Collect candidate files: `<kind dir>/*.<ext>` and `<kind dir>/<sub>/*.<ext>`.
    fn candidates(&self, root: &TierRoot, skipped: &mut Vec<ErrorRecord>) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();

        for kind in CapabilityKind::VALUES {
            let kind_dir = root.path.join(kind.dir_name());
            if !kind_dir.is_dir() {
                tracing::debug!(tier = %root.tier, dir = %kind_dir.display(), "no capability directory");
                continue;
            }

            let entries = match guard(|| fsops::list_dir(&kind_dir, &self.options.retry))? {
                Guarded::Done(entries) => entries,
                Guarded::Skipped(record) => {
                    skipped.push(record.with_context("tier", root.tier.as_str()));
                    continue;
                }
            };

            for entry in entries {
                if entry.is_dir() {
                    let segment = entry.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                    let nested = match guard(|| fsops::list_dir(&entry, &self.options.retry))? {
                        Guarded::Done(nested) => nested,
                        Guarded::Skipped(record) => {
                            skipped.push(record.with_context("tier", root.tier.as_str()));
                            continue;
                        }
                    };
                    candidates.extend(nested.into_iter().filter(|path| self.is_document(path)).map(|path| {
                        Candidate { kind: *kind, path, segments: vec![segment.clone()] }
                    }));
                } else if self.is_document(&entry) {
                    candidates.push(Candidate { kind: *kind, path: entry, segments: Vec::new() });
                }
            }
        }

        Ok(candidates)
    }

    fn is_document(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.options.extension))
    }

    /// Read, strict-parse and type one document.
    fn load_document(&self, tier: Tier, candidate: &Candidate) -> Result<CapabilityDocument> {
        let raw = fsops::read_to_string(&candidate.path, &self.options.retry)?;
        let (metadata, body) = parse_strict(&raw).map_err(|e| e.with_path(&candidate.path))?;

        let validation = validate_required_fields(&metadata, candidate.kind.expected_fields());
        if !validation.valid {
            tracing::warn!(
                path = %candidate.path.display(),
                missing = ?validation.missing,
                "capability document is missing expected metadata"
            );
        }

        let explicit = metadata.get("category").and_then(|value| value.as_text());
        let category = self.assign_category(explicit, &candidate.segments);

        CapabilityDocument::from_metadata(candidate.kind, metadata, body, category, tier, &candidate.path)
            .ok_or_else(|| Error::config("capability document has no name").with_path(&candidate.path))
    }

    /// Explicit field, then nearest directory segment, then [`UNCATEGORIZED`].
    fn assign_category(&self, explicit: Option<&str>, segments: &[String]) -> String {
        if let Some(category) = explicit.and_then(|c| self.known_category(c)) {
            return category;
        }
        if let Some(category) = segments.iter().rev().find_map(|segment| self.known_category(segment)) {
            return category;
        }
        UNCATEGORIZED.to_string()
    }

    fn known_category(&self, candidate: &str) -> Option<String> {
        let candidate = candidate.trim();
        self.options
            .categories
            .iter()
            .find(|known| known.eq_ignore_ascii_case(candidate))
            .cloned()
    }

    /// A requested category spelled the way assigned categories are.
    fn canonical_category(&self, requested: &str) -> String {
        let requested = requested.trim();
        self.known_category(requested).unwrap_or_else(|| {
            if requested.eq_ignore_ascii_case(UNCATEGORIZED) { UNCATEGORIZED.to_string() } else { requested.to_string() }
        })
    }

    /// First match for `name` in a fresh resolution: category-scoped, then unscoped.
    fn find(&self, name: &str, category: Option<&str>) -> Result<Option<CapabilityDocument>> {
        let set = self.resolve(None)?;

        if let Some(category) = category.map(|c| self.canonical_category(c))
            && let Some(doc) = set.by_name(name).find(|doc| doc.category == category)
        {
            return Ok(Some(doc.clone()));
        }

        Ok(set.by_name(name).next().cloned())
    }

    /// Look up a capability by name. Misses report every root searched.
    pub fn lookup(&self, name: &str, category: Option<&str>) -> Result<CapabilityDocument> {
        self.find(name, category)?.ok_or_else(|| {
            let err = Error::from(CapabilityLookupError {
                name: name.to_string(),
                category: category.map(str::to_string),
                searched: self.roots.iter().map(|root| root.path.clone()).collect(),
            });
            log_error(&err);
            err
        })
    }

    /// Resolved documents grouped by category.
    pub fn list_by_category(&self) -> Result<BTreeMap<String, Vec<CapabilityDocument>>> {
        Ok(self.resolve(None)?.by_category())
    }

    /// Whether `name` resolves. Failures other than a miss are logged and read as absent.
    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_some()
    }

    /// Source path of the winning document for `name`.
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        match self.find(name, None) {
            Ok(found) => found.map(|doc| doc.source_path),
            Err(e) => {
                tracing::warn!(error = %e, name, "capability lookup failed");
                None
            }
        }
    }
}
