//! Cursor rules projector.
//!
//! Modern mode writes `rules/<stem>.mdc` per capability plus an always-applied
//! `rules/capability-index.mdc`. Legacy mode writes a single `.cursorrules` instead.

use capforge_catalog::{CapabilityKind, MetadataValue, ResolvedCapabilitySet};
use capforge_core::Result;
use std::path::PathBuf;

use crate::header;
use crate::naming::assign_stems;
use crate::projector::{AdapterArtifact, Projection, ProjectionOptions, Projector, ProjectorSettings, Target};
use crate::source::{Source, load_sources, trimmed_body};

pub const RULES_DIR: &str = "rules";
pub const RULE_EXTENSION: &str = "mdc";
pub const INDEX_STEM: &str = "capability-index";
pub const LEGACY_FILE: &str = ".cursorrules";

/// Scope used when a document does not narrow it
pub const DEFAULT_GLOBS: &str = "**/*";

#[derive(Debug, Clone)]
pub struct CursorProjector {
    settings: ProjectorSettings,
}

impl CursorProjector {
    pub fn new(settings: ProjectorSettings) -> Self {
        Self { settings }
    }

    fn modern(&self, sources: &[Source<'_>]) -> Vec<AdapterArtifact> {
        let stems = assign_stems(sources.iter().map(|s| s.doc), &[INDEX_STEM]);
        let mut artifacts = Vec::with_capacity(sources.len() + 1);

        for source in sources {
            let doc = source.doc;
            let description = doc.description.clone().unwrap_or_else(|| format!("{} {}", doc.kind, doc.name));
            let mut content = header::render(&[
                ("description", header::scalar(&description)),
                ("globs", globs(source)),
                ("alwaysApply", "false".to_string()),
            ]);
            content.push('\n');
            content.push_str(trimmed_body(&source.body));
            ensure_trailing_newline(&mut content);

            let stem = &stems[&doc.key()];
            artifacts.push(AdapterArtifact::capability(Target::Cursor, rule_path(stem), content));
        }

        if !artifacts.is_empty() {
            artifacts.push(AdapterArtifact::synthesized(Target::Cursor, rule_path(INDEX_STEM), self.render_index(sources)));
        }
        artifacts
    }

    fn render_index(&self, sources: &[Source<'_>]) -> String {
        let mut out = header::render(&[
            ("description", header::scalar(&format!("Index of {} commands and agents", self.settings.manifest.name))),
            ("globs", DEFAULT_GLOBS.to_string()),
            ("alwaysApply", "true".to_string()),
        ]);
        out.push_str("\n# Available capabilities\n");

        for (kind, title) in [(CapabilityKind::Workflow, "Commands"), (CapabilityKind::Agent, "Agents")] {
            out.push_str(&format!("\n## {title}\n\n"));
            let mut any = false;
            for source in sources.iter().filter(|s| s.doc.kind == kind) {
                out.push_str(&format!("- `{}`: {}\n", source.doc.name, source.doc.description_or("")));
                any = true;
            }
            if !any {
                out.push_str("_None._\n");
            }
        }
        out
    }

    fn legacy(&self, sources: &[Source<'_>]) -> Vec<AdapterArtifact> {
        if sources.is_empty() {
            return Vec::new();
        }

        let mut out = String::new();
        out.push_str(&format!("# {} rules\n\n", self.settings.manifest.name));
        out.push_str(&format!("{}\n\n", self.settings.manifest.description));

        for source in sources.iter().filter(|s| s.doc.kind == CapabilityKind::Workflow) {
            out.push_str(&format!("## Workflow: {}\n\n", source.doc.name));
            if let Some(description) = &source.doc.description {
                out.push_str(&format!("{description}\n\n"));
            }
            let steps = numbered_steps(&source.body);
            if !steps.is_empty() {
                out.push_str(&steps);
                out.push('\n');
            }
        }

        out.push_str("## Agents\n\n");
        let mut any = false;
        for source in sources.iter().filter(|s| s.doc.kind == CapabilityKind::Agent) {
            out.push_str(&format!("- {} ({}): {}\n", source.doc.name, source.doc.category, source.doc.description_or("")));
            any = true;
        }
        if !any {
            out.push_str("_None._\n");
        }

        vec![AdapterArtifact::capability(Target::Cursor, LEGACY_FILE, out)]
    }
}

impl Projector for CursorProjector {
    fn target(&self) -> Target {
        Target::Cursor
    }

    fn project(&self, set: &ResolvedCapabilitySet, options: &ProjectionOptions) -> Result<Projection> {
        let (sources, skipped) = load_sources(Target::Cursor, set.iter(), &self.settings.retry)?;
        let artifacts = if options.legacy { self.legacy(&sources) } else { self.modern(&sources) };
        Projection::finish(Target::Cursor, artifacts, skipped)
    }
}

fn rule_path(stem: &str) -> PathBuf {
    PathBuf::from(RULES_DIR).join(format!("{stem}.{RULE_EXTENSION}"))
}

/// `globs`, then `scope`, from the document's own metadata.
fn globs(source: &Source<'_>) -> String {
    ["globs", "scope"]
        .iter()
        .filter_map(|key| source.metadata.get(*key))
        .map(MetadataValue::to_list)
        .find(|list| !list.is_empty())
        .map(|list| header::globs(&list.join(",")))
        .unwrap_or_else(|| DEFAULT_GLOBS.to_string())
}

fn ensure_trailing_newline(content: &mut String) {
    if !content.ends_with('\n') {
        content.push('\n');
    }
}

/// Reformat a workflow body as a numbered list.
///
/// Each non-blank line becomes one step with heading and list markers removed. Fenced
/// code blocks stay intact, indented under the step before them.
pub(crate) fn numbered_steps(body: &str) -> String {
    let mut out = String::new();
    let mut step = 0;
    let mut in_fence = false;

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            out.push_str(&format!("   {trimmed}\n"));
            continue;
        }
        if in_fence {
            out.push_str(&format!("   {line}\n"));
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        let text = strip_marker(trimmed);
        if text.is_empty() {
            continue;
        }
        step += 1;
        out.push_str(&format!("{step}. {text}\n"));
    }
    out
}

fn strip_marker(line: &str) -> &str {
    let line = line.trim_start_matches('#').trim_start();
    for bullet in ["- [ ] ", "- [x] ", "- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0
        && let Some(rest) = line[digits..].strip_prefix(". ").or_else(|| line[digits..].strip_prefix(") "))
    {
        return rest.trim();
    }
    line
}
