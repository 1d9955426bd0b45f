//! Claude plugin projector.
//!
//! Output layout:
//! ```text
//! plugin.json
//! commands/<stem>.md
//! agents/<category>/<stem>.md
//! README.md
//! ```
//!
//! Stems are assigned once for `commands/` and once per agent category directory.
//! Each manifest entry records the path of its file, relative to the plugin root.
//!
//! Documents are copied verbatim. The manifest is built from the copied text, never
//! from the resolver's view of the document, so it always describes what was written.

use capforge_catalog::{CapabilityKind, MetadataValue, ResolvedCapabilitySet, parse_tolerant};
use capforge_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::naming::{assign_stems, sanitize};
use crate::projector::{AdapterArtifact, Projection, ProjectionOptions, Projector, ProjectorSettings, Target};
use crate::source::load_sources;

pub const MANIFEST_FILE: &str = "plugin.json";
pub const README_FILE: &str = "README.md";
pub const COMMANDS_DIR: &str = "commands";
pub const AGENTS_DIR: &str = "agents";

/// `plugin.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub commands: Vec<CommandEntry>,
    pub agents: Vec<AgentEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEntry {
    pub name: String,
    pub path: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub path: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct ClaudeProjector {
    settings: ProjectorSettings,
}

impl ClaudeProjector {
    pub fn new(settings: ProjectorSettings) -> Self {
        Self { settings }
    }

    fn manifest(&self, commands: Vec<CommandEntry>, agents: Vec<AgentEntry>) -> PluginManifest {
        let identity = &self.settings.manifest;
        PluginManifest {
            name: identity.name.clone(),
            version: identity.version.clone(),
            description: identity.description.clone(),
            commands,
            agents,
        }
    }
}

impl Projector for ClaudeProjector {
    fn target(&self) -> Target {
        Target::Claude
    }

    fn project(&self, set: &ResolvedCapabilitySet, _options: &ProjectionOptions) -> Result<Projection> {
        let (sources, skipped) = load_sources(Target::Claude, set.iter(), &self.settings.retry)?;

        let mut stems = assign_stems(
            sources.iter().filter(|s| s.doc.kind == CapabilityKind::Workflow).map(|s| s.doc),
            &[],
        );
        let mut agent_dirs: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for source in sources.iter().filter(|s| s.doc.kind == CapabilityKind::Agent) {
            agent_dirs.entry(sanitize(&source.doc.category)).or_default().push(source.doc);
        }
        for docs in agent_dirs.values() {
            stems.extend(assign_stems(docs.iter().copied(), &[]));
        }

        let mut artifacts = Vec::new();
        let mut commands = Vec::new();
        let mut agents = Vec::new();

        for source in &sources {
            let doc = source.doc;
            let file = format!("{}.md", stems[&doc.key()]);
            let relative_path = match doc.kind {
                CapabilityKind::Workflow => PathBuf::from(COMMANDS_DIR).join(&file),
                CapabilityKind::Agent => PathBuf::from(AGENTS_DIR).join(sanitize(&doc.category)).join(&file),
            };
            let path = relative_path.to_string_lossy().replace('\\', "/");
            let artifact = AdapterArtifact::capability(Target::Claude, relative_path, source.raw.clone());

            let copied = parse_tolerant(&artifact.content);
            let text = |key: &str| copied.get(key).and_then(MetadataValue::as_text).map(str::to_string);
            let name = text("name").filter(|n| !n.trim().is_empty()).unwrap_or_else(|| doc.name.clone());
            let description = text("description").unwrap_or_default();

            match doc.kind {
                CapabilityKind::Workflow => commands.push(CommandEntry {
                    name,
                    path,
                    description,
                    argument_hint: text("argument-hint"),
                    framework: text("framework"),
                }),
                CapabilityKind::Agent => agents.push(AgentEntry { name, path, description, category: doc.category.clone() }),
            }
            artifacts.push(artifact);
        }

        if !artifacts.is_empty() {
            let manifest = self.manifest(commands, agents);
            let json = serde_json::to_string_pretty(&manifest)
                .map_err(|e| Error::critical(format!("plugin manifest failed to serialize: {e}")))?;
            artifacts.push(AdapterArtifact::synthesized(Target::Claude, MANIFEST_FILE, json + "\n"));
            artifacts.push(AdapterArtifact::synthesized(Target::Claude, README_FILE, render_readme(&manifest)));
        }

        Projection::finish(Target::Claude, artifacts, skipped)
    }
}

fn render_readme(manifest: &PluginManifest) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", manifest.name));
    out.push_str(&format!("{}\n\n", manifest.description));
    out.push_str(&format!(
        "Version {}: {} commands, {} agents.\n\n",
        manifest.version,
        manifest.commands.len(),
        manifest.agents.len()
    ));

    out.push_str("## Commands\n\n");
    if manifest.commands.is_empty() {
        out.push_str("_None._\n");
    }
    for command in &manifest.commands {
        let hint = command.argument_hint.as_deref().map(|h| format!(" {h}")).unwrap_or_default();
        out.push_str(&format!("- `/{}{}`: {}\n", command.name, hint, command.description));
    }

    out.push_str("\n## Agents\n\n");
    if manifest.agents.is_empty() {
        out.push_str("_None._\n");
    }
    let mut current: Option<&str> = None;
    for agent in &manifest.agents {
        if current != Some(agent.category.as_str()) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("### {}\n\n", agent.category));
            current = Some(agent.category.as_str());
        }
        out.push_str(&format!("- **{}**: {}\n", agent.name, agent.description));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use capforge_catalog::{CapabilityDocument, Metadata, Tier};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_doc(dir: &Path, kind: CapabilityKind, name: &str, category: &str, content: &str) -> CapabilityDocument {
        let path = dir.join(format!("{name}.md"));
        fs::write(&path, content).unwrap();
        CapabilityDocument::from_metadata(kind, Metadata::new(), String::new(), category.to_string(), Tier::Project, &path)
            .unwrap()
    }

    fn projector() -> ClaudeProjector {
        ClaudeProjector::new(ProjectorSettings {
            retry: capforge_core::RetryPolicy::no_retry(),
            ..Default::default()
        })
    }

    #[test]
    fn test_copies_verbatim_and_builds_manifest() {
        let temp = TempDir::new().unwrap();
        let plan = "---\nname: plan\ndescription: Plan a feature\nargument-hint: \"[feature]\"\n---\n\nSteps\n";
        let sentinel = "---\nname: security-sentinel\ndescription: Finds vulnerabilities\n---\nYou review.\n";
        let set = ResolvedCapabilitySet::from_documents(vec![
            write_doc(temp.path(), CapabilityKind::Workflow, "plan", "uncategorized", plan),
            write_doc(temp.path(), CapabilityKind::Agent, "security-sentinel", "review", sentinel),
        ]);

        let projection = projector().project(&set, &ProjectionOptions::default()).unwrap();
        let paths: Vec<_> = projection.artifacts.iter().map(|a| a.relative_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("commands/plan.md"),
                PathBuf::from("agents/review/security-sentinel.md"),
                PathBuf::from(MANIFEST_FILE),
                PathBuf::from(README_FILE),
            ]
        );
        assert_eq!(projection.artifacts[0].content, plan);
        assert_eq!(projection.artifacts[1].content, sentinel);

        let manifest: PluginManifest = serde_json::from_str(&projection.artifacts[2].content).unwrap();
        assert_eq!(manifest.name, "capforge");
        assert_eq!(manifest.commands.len(), 1);
        assert_eq!(manifest.commands[0].argument_hint.as_deref(), Some("[feature]"));
        assert_eq!(manifest.agents[0].category, "review");
        assert!(!projection.artifacts[2].content.contains("framework"));
        assert!(projection.artifacts[3].content.contains("- `/plan [feature]`: Plan a feature"));
        assert!(projection.artifacts[3].content.contains("### review"));
    }

    #[test]
    fn test_manifest_uses_camel_case_keys() {
        let entry = CommandEntry {
            name: "plan".into(),
            path: "commands/plan.md".into(),
            description: "d".into(),
            argument_hint: Some("[x]".into()),
            framework: Some("rails".into()),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["argumentHint"], "[x]");
        assert_eq!(json["framework"], "rails");
    }

    #[test]
    fn test_names_equal_after_sanitizing_get_distinct_files() {
        let temp = TempDir::new().unwrap();
        let spaced = temp.path().join("spaced");
        let dashed = temp.path().join("dashed");
        fs::create_dir_all(&spaced).unwrap();
        fs::create_dir_all(&dashed).unwrap();
        let set = ResolvedCapabilitySet::from_documents(vec![
            write_doc(&spaced, CapabilityKind::Workflow, "review pr", "uncategorized", "---\nname: review pr\n---\nA\n"),
            write_doc(&dashed, CapabilityKind::Workflow, "review-pr", "uncategorized", "---\nname: review-pr\n---\nB\n"),
            write_doc(&spaced, CapabilityKind::Agent, "lint me", "style", "---\nname: lint me\n---\nC\n"),
            write_doc(&dashed, CapabilityKind::Agent, "lint-me", "style", "---\nname: lint-me\n---\nD\n"),
        ]);

        let projection = projector().project(&set, &ProjectionOptions::default()).unwrap();
        let paths: std::collections::BTreeSet<_> =
            projection.capability_artifacts().map(|a| a.relative_path.clone()).collect();
        assert_eq!(paths.len(), 4);

        let manifest: PluginManifest = serde_json::from_str(
            &projection.artifacts.iter().find(|a| a.relative_path == Path::new(MANIFEST_FILE)).unwrap().content,
        )
        .unwrap();
        assert_eq!(manifest.commands.len(), 2);
        assert_eq!(manifest.agents.len(), 2);
        for entry in &manifest.commands {
            let file = projection.artifacts.iter().find(|a| a.relative_path == Path::new(&entry.path)).unwrap();
            assert!(file.content.contains(&format!("name: {}", entry.name)));
        }
        for entry in &manifest.agents {
            assert!(entry.path.starts_with("agents/style/"));
            assert!(paths.contains(Path::new(&entry.path)));
        }
    }

    #[test]
    fn test_empty_set_is_a_projection_error() {
        let err = projector().project(&ResolvedCapabilitySet::default(), &ProjectionOptions::default()).unwrap_err();
        assert_eq!(err.code(), capforge_core::ErrorCode::Projection);
    }
}
