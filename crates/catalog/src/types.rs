//! Core types for the capability catalog.
//!
//! A capability document is a Workflow or an Agent definition: a metadata block
//! followed by a free-text body. Documents live under three precedence roots and are
//! merged into a [`ResolvedCapabilitySet`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use capforge_core::ErrorRecord;
use serde::{Deserialize, Serialize};

/// Category assigned when neither metadata nor directory names a known one
pub const UNCATEGORIZED: &str = "uncategorized";

/// What a capability document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// A slash-command style workflow
    Workflow,
    /// An assistant persona / sub-agent
    Agent,
}

impl CapabilityKind {
    pub const VALUES: &[CapabilityKind] = &[CapabilityKind::Workflow, CapabilityKind::Agent];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Workflow => "workflow",
            CapabilityKind::Agent => "agent",
        }
    }

    /// Directory holding this kind inside a precedence root
    pub fn dir_name(&self) -> &'static str {
        match self {
            CapabilityKind::Workflow => "workflows",
            CapabilityKind::Agent => "agents",
        }
    }

    /// Metadata keys every document of this kind is expected to carry
    pub fn expected_fields(&self) -> &'static [&'static str] {
        match self {
            CapabilityKind::Workflow => &["name", "description"],
            CapabilityKind::Agent => &["name", "description", "category", "frameworks"],
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precedence level of a root. Declaration order is precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Project,
    User,
    Package,
}

impl Tier {
    pub const VALUES: &[Tier] = &[Tier::Project, Tier::User, Tier::Package];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Project => "project",
            Tier::User => "user",
            Tier::Package => "package",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A precedence root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRoot {
    pub tier: Tier,
    pub path: PathBuf,
}

impl TierRoot {
    pub fn new(tier: Tier, path: impl Into<PathBuf>) -> Self {
        Self { tier, path: path.into() }
    }

    /// Roots in precedence order from configured paths
    pub fn from_paths(paths: &capforge_core::RootPaths) -> Vec<TierRoot> {
        vec![
            TierRoot::new(Tier::Project, &paths.project),
            TierRoot::new(Tier::User, &paths.user),
            TierRoot::new(Tier::Package, &paths.package),
        ]
    }
}

/// A metadata value: a scalar or a list of scalars
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            MetadataValue::List(_) => None,
        }
    }

    /// Lists as-is; a text value becomes a one-element list (empty text, no elements)
    pub fn to_list(&self) -> Vec<String> {
        match self {
            MetadataValue::Text(text) if text.trim().is_empty() => Vec::new(),
            MetadataValue::Text(text) => vec![text.clone()],
            MetadataValue::List(items) => items.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MetadataValue::Text(text) => text.trim().is_empty(),
            MetadataValue::List(items) => items.is_empty(),
        }
    }

    /// Comma-joined rendering used in generated headers
    pub fn joined(&self) -> String {
        match self {
            MetadataValue::Text(text) => text.clone(),
            MetadataValue::List(items) => items.join(", "),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

/// Parsed metadata block, ordered by key
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Logical name of a capability: unique per kind in a resolved set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityKey {
    pub kind: CapabilityKind,
    pub name: String,
}

impl CapabilityKey {
    pub fn new(kind: CapabilityKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into() }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// A workflow or agent definition with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDocument {
    /// Logical name; never empty
    pub name: String,

    pub kind: CapabilityKind,

    /// A known category or [`UNCATEGORIZED`]
    pub category: String,

    pub description: Option<String>,

    /// `argument-hint` for workflows
    #[serde(default)]
    pub argument_hint: Option<String>,

    #[serde(default)]
    pub framework: Option<String>,

    #[serde(default)]
    pub frameworks: Vec<String>,

    /// Every metadata key without a typed field
    #[serde(default)]
    pub extra: Metadata,

    /// Text after the metadata block
    pub body: String,

    pub tier: Tier,

    pub source_path: PathBuf,
}

/// Keys lifted into typed fields
const KNOWN_KEYS: &[&str] = &[
    "name",
    "description",
    "category",
    "argument-hint",
    "argument_hint",
    "argumentHint",
    "framework",
    "frameworks",
];

impl CapabilityDocument {
    /// Build a document from parsed metadata; `None` when no name can be derived.
    pub fn from_metadata(
        kind: CapabilityKind, mut metadata: Metadata, body: String, category: String, tier: Tier, source_path: &Path,
    ) -> Option<Self> {
        let text = |metadata: &Metadata, key: &str| {
            metadata
                .get(key)
                .and_then(MetadataValue::as_text)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = text(&metadata, "name").or_else(|| {
            source_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .filter(|stem| !stem.is_empty())
        })?;
        let description = text(&metadata, "description");
        let argument_hint = ["argument-hint", "argument_hint", "argumentHint"]
            .iter()
            .find_map(|key| text(&metadata, key));
        let framework = text(&metadata, "framework");
        let frameworks = metadata.get("frameworks").map(MetadataValue::to_list).unwrap_or_default();

        metadata.retain(|key, _| !KNOWN_KEYS.contains(&key.as_str()));

        Some(Self {
            name,
            kind,
            category,
            description,
            argument_hint,
            framework,
            frameworks,
            extra: metadata,
            body,
            tier,
            source_path: source_path.to_path_buf(),
        })
    }

    pub fn key(&self) -> CapabilityKey {
        CapabilityKey::new(self.kind, self.name.clone())
    }

    /// Description, or `fallback` when absent
    pub fn description_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.description.as_deref().unwrap_or(fallback)
    }

    /// Look up an unrecognised metadata key
    pub fn extra_value(&self, key: &str) -> Option<&MetadataValue> {
        self.extra.get(key)
    }

    pub fn is_categorized(&self) -> bool {
        self.category != UNCATEGORIZED
    }
}

/// The effective logical-name → document map after the tier merge.
///
/// Built once per resolution and never mutated afterwards. Iteration is ordered by
/// kind (workflows first) and then name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedCapabilitySet {
    entries: BTreeMap<CapabilityKey, CapabilityDocument>,
}

impl ResolvedCapabilitySet {
    pub(crate) fn from_entries(entries: BTreeMap<CapabilityKey, CapabilityDocument>) -> Self {
        Self { entries }
    }

    /// Build a set directly from documents; later documents replace earlier ones with the same key
    pub fn from_documents(documents: impl IntoIterator<Item = CapabilityDocument>) -> Self {
        Self { entries: documents.into_iter().map(|doc| (doc.key(), doc)).collect() }
    }

    pub fn get(&self, key: &CapabilityKey) -> Option<&CapabilityDocument> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDocument> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CapabilityKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn workflows(&self) -> impl Iterator<Item = &CapabilityDocument> {
        self.iter().filter(|doc| doc.kind == CapabilityKind::Workflow)
    }

    pub fn agents(&self) -> impl Iterator<Item = &CapabilityDocument> {
        self.iter().filter(|doc| doc.kind == CapabilityKind::Agent)
    }

    /// Every document with the given name, across kinds
    pub fn by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CapabilityDocument> + 'a {
        self.iter().filter(move |doc| doc.name == name)
    }

    /// A new set holding only documents of `category`
    pub fn filter_category(&self, category: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, doc)| doc.category == category)
                .map(|(key, doc)| (key.clone(), doc.clone()))
                .collect(),
        }
    }

    /// Group documents by category
    pub fn by_category(&self) -> BTreeMap<String, Vec<CapabilityDocument>> {
        let mut groups: BTreeMap<String, Vec<CapabilityDocument>> = BTreeMap::new();
        for doc in self.iter() {
            groups.entry(doc.category.clone()).or_default().push(doc.clone());
        }
        groups
    }
}

impl<'a> IntoIterator for &'a ResolvedCapabilitySet {
    type Item = &'a CapabilityDocument;
    type IntoIter = std::collections::btree_map::Values<'a, CapabilityKey, CapabilityDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// A resolved set plus what was skipped on the way
#[derive(Debug, Clone)]
pub struct Resolution {
    pub set: ResolvedCapabilitySet,
    /// One record per document that could not be loaded
    pub skipped: Vec<ErrorRecord>,
    /// Candidate files seen across all tiers
    pub scanned: usize,
}
