//! Qoder command projector.
//!
//! Writes one `<stem>.md` per workflow with a description-only header, plus a
//! `config.json` index and a generated `README.md`. Agents have no Qoder counterpart.

use capforge_catalog::{MetadataValue, ResolvedCapabilitySet};
use capforge_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::header;
use crate::naming::assign_stems;
use crate::projector::{AdapterArtifact, Projection, ProjectionOptions, Projector, ProjectorSettings, Target};
use crate::source::{load_sources, trimmed_body};

pub const CONFIG_FILE: &str = "config.json";
pub const README_FILE: &str = "README.md";

/// Header description for workflows that carry none
pub const FALLBACK_DESCRIPTION: &str = "Compound workflow command";

/// One entry of `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    /// Relative to the directory holding `config.json`
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct QoderProjector {
    settings: ProjectorSettings,
}

impl QoderProjector {
    pub fn new(settings: ProjectorSettings) -> Self {
        Self { settings }
    }

    fn render_readme(&self, commands: &[CommandConfig]) -> String {
        let manifest = &self.settings.manifest;
        let mut out = String::new();
        out.push_str(&format!("# {} commands for Qoder\n\n", manifest.name));
        out.push_str(&format!("{}\n\n", manifest.description));

        out.push_str("## Installation\n\n");
        out.push_str("Copy this directory to `.qoder/commands/` in your project, or to\n");
        out.push_str("`~/.qoder/commands/` to make the commands available everywhere.\n\n");

        out.push_str("## Usage\n\n");
        out.push_str("Type `/` followed by a command name in the Qoder chat.\n\n");

        out.push_str(&format!("## Commands ({})\n\n", commands.len()));
        for command in commands {
            out.push_str(&format!("- `/{}`: {}\n", command.name, command.description));
        }
        out
    }
}

impl Projector for QoderProjector {
    fn target(&self) -> Target {
        Target::Qoder
    }

    fn project(&self, set: &ResolvedCapabilitySet, _options: &ProjectionOptions) -> Result<Projection> {
        let (sources, skipped) = load_sources(Target::Qoder, set.workflows(), &self.settings.retry)?;
        let stems = assign_stems(sources.iter().map(|s| s.doc), &[]);

        let mut artifacts = Vec::with_capacity(sources.len() + 2);
        let mut commands = Vec::with_capacity(sources.len());

        for source in &sources {
            let description = source
                .metadata
                .get("description")
                .and_then(MetadataValue::as_text)
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(FALLBACK_DESCRIPTION)
                .to_string();

            let mut content = header::render(&[("description", header::scalar(&description))]);
            content.push('\n');
            content.push_str(trimmed_body(&source.body));
            if !content.ends_with('\n') {
                content.push('\n');
            }

            let path = format!("{}.md", stems[&source.doc.key()]);
            commands.push(CommandConfig { name: source.doc.name.clone(), path: path.clone(), description });
            artifacts.push(AdapterArtifact::capability(Target::Qoder, path, content));
        }

        if !artifacts.is_empty() {
            let json = serde_json::to_string_pretty(&commands)
                .map_err(|e| Error::critical(format!("qoder config failed to serialize: {e}")))?;
            artifacts.push(AdapterArtifact::synthesized(Target::Qoder, CONFIG_FILE, json + "\n"));
            artifacts.push(AdapterArtifact::synthesized(Target::Qoder, README_FILE, self.render_readme(&commands)));
        }

        Projection::finish(Target::Qoder, artifacts, skipped)
    }
}
