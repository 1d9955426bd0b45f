use capforge_catalog::ResolvedCapabilitySet;
use capforge_core::config::TargetsConfig;
use capforge_core::{Config, Error, ErrorRecord, ManifestConfig, Result, RetryPolicy, log_error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::claude::ClaudeProjector;
use crate::cursor::CursorProjector;
use crate::qoder::QoderProjector;

/// Host tool an artifact tree is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Claude,
    Cursor,
    Qoder,
}

impl Target {
    pub const VALUES: &[Target] = &[Target::Claude, Target::Cursor, Target::Qoder];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Claude => "claude",
            Target::Cursor => "cursor",
            Target::Qoder => "qoder",
        }
    }

    /// Output directory used when neither the command line nor the config names one
    pub fn default_output_dir(&self) -> PathBuf {
        match self {
            Target::Claude => PathBuf::from(".claude-plugin"),
            Target::Cursor => PathBuf::from(".cursor"),
            Target::Qoder => PathBuf::from(".qoder/commands"),
        }
    }

    /// Configured output directory, falling back to [`Target::default_output_dir`]
    pub fn output_dir(&self, targets: &TargetsConfig) -> PathBuf {
        let configured = match self {
            Target::Claude => &targets.claude,
            Target::Cursor => &targets.cursor,
            Target::Qoder => &targets.qoder,
        };
        configured.clone().unwrap_or_else(|| self.default_output_dir())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an artifact carries a capability or was synthesized around them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Capability,
    /// Manifests, indexes, companion config and READMEs
    Synthesized,
}

/// One output file, relative to the target's output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterArtifact {
    pub target: Target,
    pub relative_path: PathBuf,
    pub content: String,
    pub role: ArtifactRole,
}

impl AdapterArtifact {
    pub fn capability(target: Target, relative_path: impl Into<PathBuf>, content: String) -> Self {
        Self { target, relative_path: relative_path.into(), content, role: ArtifactRole::Capability }
    }

    pub fn synthesized(target: Target, relative_path: impl Into<PathBuf>, content: String) -> Self {
        Self { target, relative_path: relative_path.into(), content, role: ArtifactRole::Synthesized }
    }
}

/// Per-run projector flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Cursor only: emit a single `.cursorrules` instead of `rules/*.mdc`
    pub legacy: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionCounts {
    /// Artifacts produced, synthesized ones included
    pub written: usize,
    /// Source documents that could not be re-read or re-parsed
    pub skipped: usize,
}

/// Outcome of one projector run
#[derive(Debug, Clone)]
pub struct Projection {
    pub target: Target,
    pub artifacts: Vec<AdapterArtifact>,
    pub counts: ProjectionCounts,
    pub skipped: Vec<ErrorRecord>,
}

impl Projection {
    /// Assemble the outcome. Fails when no capability artifact was produced.
    pub(crate) fn finish(target: Target, artifacts: Vec<AdapterArtifact>, skipped: Vec<ErrorRecord>) -> Result<Self> {
        let capabilities = artifacts.iter().filter(|a| a.role == ArtifactRole::Capability).count();
        if capabilities == 0 {
            let err = Error::projection(
                target.as_str(),
                format!("no capability artifacts produced ({} source documents skipped)", skipped.len()),
            );
            log_error(&err);
            return Err(err);
        }

        let counts = ProjectionCounts { written: artifacts.len(), skipped: skipped.len() };
        tracing::info!(target_tool = %target, written = counts.written, skipped = counts.skipped, "projection complete");
        Ok(Self { target, artifacts, counts, skipped })
    }

    pub fn capability_artifacts(&self) -> impl Iterator<Item = &AdapterArtifact> {
        self.artifacts.iter().filter(|a| a.role == ArtifactRole::Capability)
    }
}

/// Immutable settings shared by every projector
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorSettings {
    pub manifest: ManifestConfig,
    pub retry: RetryPolicy,
}

impl Default for ProjectorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ProjectorSettings {
    fn from(config: &Config) -> Self {
        Self { manifest: config.manifest.clone(), retry: config.retry }
    }
}

/// Maps a resolved capability set to one host tool's artifact tree.
///
/// Implementations hold only configuration; `project` never touches the output
/// directory and returns the same artifacts for the same inputs.
pub trait Projector: Send + Sync + fmt::Debug {
    fn target(&self) -> Target;

    fn project(&self, set: &ResolvedCapabilitySet, options: &ProjectionOptions) -> Result<Projection>;
}

/// Build the projector for `target`.
pub fn projector_for(target: Target, settings: &ProjectorSettings) -> Box<dyn Projector> {
    match target {
        Target::Claude => Box::new(ClaudeProjector::new(settings.clone())),
        Target::Cursor => Box::new(CursorProjector::new(settings.clone())),
        Target::Qoder => Box::new(QoderProjector::new(settings.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dirs() {
        let mut targets = TargetsConfig::default();
        assert_eq!(Target::Claude.output_dir(&targets), PathBuf::from(".claude-plugin"));
        assert_eq!(Target::Qoder.output_dir(&targets), PathBuf::from(".qoder/commands"));

        targets.cursor = Some(PathBuf::from("out/cursor"));
        assert_eq!(Target::Cursor.output_dir(&targets), PathBuf::from("out/cursor"));
    }

    #[test]
    fn test_finish_requires_a_capability_artifact() {
        let readme = AdapterArtifact::synthesized(Target::Qoder, "README.md", "guide".to_string());
        let err = Projection::finish(Target::Qoder, vec![readme.clone()], Vec::new()).unwrap_err();
        assert_eq!(err.code(), capforge_core::ErrorCode::Projection);

        let command = AdapterArtifact::capability(Target::Qoder, "plan.md", "plan".to_string());
        let projection = Projection::finish(Target::Qoder, vec![command, readme], Vec::new()).unwrap();
        assert_eq!(projection.counts.written, 2);
        assert_eq!(projection.capability_artifacts().count(), 1);
    }

    #[test]
    fn test_projector_for_matches_target() {
        let settings = ProjectorSettings::default();
        for target in Target::VALUES {
            assert_eq!(projector_for(*target, &settings).target(), *target);
        }
    }
}
