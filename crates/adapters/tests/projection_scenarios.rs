use std::fs;
use std::path::{Path, PathBuf};

use capforge_adapters::claude::{COMMANDS_DIR, MANIFEST_FILE};
use capforge_adapters::qoder::FALLBACK_DESCRIPTION;
use capforge_adapters::{
    PluginManifest, ProjectionOptions, ProjectorSettings, Target, WriteOptions, projector_for, write_artifacts,
};
use capforge_catalog::{Resolver, ResolverOptions, Tier, TierRoot};
use capforge_core::{ErrorCode, RetryPolicy};
use tempfile::TempDir;

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        for tier in ["project", "user", "package"] {
            fs::create_dir_all(temp.path().join(tier)).unwrap();
        }
        Self { temp }
    }

    fn root(&self, tier: &str) -> PathBuf {
        self.temp.path().join(tier)
    }

    fn write(&self, tier: &str, relative: &str, content: &str) {
        let path = self.root(tier).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(
            vec![
                TierRoot::new(Tier::Project, self.root("project")),
                TierRoot::new(Tier::User, self.root("user")),
                TierRoot::new(Tier::Package, self.root("package")),
            ],
            ResolverOptions { retry: RetryPolicy::no_retry(), ..Default::default() },
        )
        .unwrap()
    }

    fn output(&self, name: &str) -> PathBuf {
        self.temp.path().join("out").join(name)
    }
}

fn settings() -> ProjectorSettings {
    ProjectorSettings { retry: RetryPolicy::no_retry(), ..Default::default() }
}

fn write_options() -> WriteOptions {
    WriteOptions { force: false, retry: RetryPolicy::no_retry() }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path.strip_prefix(dir).unwrap().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

#[test]
fn test_project_tier_override_reaches_every_target() {
    let ws = Workspace::new();
    ws.write("project", "agents/foo.md", "---\nname: foo\ndescription: \"P\"\n---\nproject body\n");
    ws.write("package", "agents/foo.md", "---\nname: foo\ndescription: \"Q\"\n---\npackage body\n");
    ws.write("package", "workflows/plan.md", "---\nname: plan\ndescription: Plan\n---\nsteps\n");

    let set = ws.resolver().resolve(None).unwrap();
    assert_eq!(set.len(), 2);

    let claude = projector_for(Target::Claude, &settings()).project(&set, &ProjectionOptions::default()).unwrap();
    let agent = claude.artifacts.iter().find(|a| a.relative_path == Path::new("agents/uncategorized/foo.md")).unwrap();
    assert!(agent.content.contains("project body"));
    assert!(!agent.content.contains("package body"));
}

#[test]
fn test_claude_manifest_round_trip() {
    let ws = Workspace::new();
    ws.write("package", "workflows/plan.md", "---\nname: plan\ndescription: Plan\n---\n1. Think\n");
    ws.write("package", "workflows/work.md", "---\nname: work\ndescription: Work\nframework: rails\n---\nDo it\n");
    ws.write("user", "workflows/review.md", "---\nname: review\n---\nReview\n");
    ws.write("package", "agents/review/security-sentinel.md", "---\nname: security-sentinel\n---\nBe careful\n");

    let set = ws.resolver().resolve(None).unwrap();
    let projection = projector_for(Target::Claude, &settings()).project(&set, &ProjectionOptions::default()).unwrap();
    let out = ws.output("claude");
    write_artifacts(&out, &projection.artifacts, &write_options()).unwrap();

    let manifest: PluginManifest = serde_json::from_str(&fs::read_to_string(out.join(MANIFEST_FILE)).unwrap()).unwrap();
    let mut from_manifest: Vec<PathBuf> = manifest.commands.iter().map(|c| PathBuf::from(&c.path)).collect();
    from_manifest.sort();

    let from_disk: Vec<PathBuf> =
        files_under(&out).into_iter().filter(|p| p.starts_with(COMMANDS_DIR)).collect();
    assert_eq!(from_manifest, from_disk);
    assert_eq!(from_disk.len(), 3);

    let work = manifest.commands.iter().find(|c| c.name == "work").unwrap();
    assert_eq!(work.framework.as_deref(), Some("rails"));
    assert_eq!(manifest.agents.len(), 1);
    assert_eq!(manifest.agents[0].category, "review");
}

#[test]
fn test_cursor_legacy_emits_one_file() {
    let ws = Workspace::new();
    ws.write("package", "workflows/plan.md", "---\nname: plan\ndescription: Plan a feature\n---\n- Research\n- Outline\n");
    ws.write("package", "workflows/work.md", "---\nname: work\ndescription: Execute the plan\n---\n- Build\n- Test\n");

    let set = ws.resolver().resolve(None).unwrap();
    let projection =
        projector_for(Target::Cursor, &settings()).project(&set, &ProjectionOptions { legacy: true }).unwrap();
    assert_eq!(projection.artifacts.len(), 1);

    let out = ws.output("cursor");
    write_artifacts(&out, &projection.artifacts, &write_options()).unwrap();
    let files = files_under(&out);
    assert_eq!(files, vec![PathBuf::from(".cursorrules")]);
    assert!(!files.iter().any(|p| p.extension().is_some_and(|e| e == "mdc")));

    let rules = fs::read_to_string(out.join(".cursorrules")).unwrap();
    assert!(rules.contains("## Workflow: plan"));
    assert!(rules.contains("## Workflow: work"));
    assert!(rules.contains("1. Build\n2. Test\n"));
}

#[test]
fn test_qoder_description_fallback() {
    let ws = Workspace::new();
    ws.write("project", "workflows/compound.md", "---\nname: compound\n---\n\nRun every step.\n");

    let set = ws.resolver().resolve(None).unwrap();
    let projection = projector_for(Target::Qoder, &settings()).project(&set, &ProjectionOptions::default()).unwrap();

    let command = projection.artifacts.iter().find(|a| a.relative_path == Path::new("compound.md")).unwrap();
    assert_eq!(command.content, format!("---\ndescription: {FALLBACK_DESCRIPTION}\n---\n\nRun every step.\n"));
    assert!(!command.content.contains("name: compound"));
}

#[test]
fn test_only_malformed_documents_is_a_projection_error() {
    let ws = Workspace::new();
    ws.write("package", "workflows/broken.md", "---\nname: broken\ndescription: never closed\n\nbody\n");
    ws.write("package", "agents/review/also-broken.md", "---\nname: [\n---\nbody\n");

    let resolution = ws.resolver().resolve_report(None).unwrap();
    assert!(resolution.set.is_empty());
    assert_eq!(resolution.skipped.len(), 2);

    for target in Target::VALUES {
        let err = projector_for(*target, &settings()).project(&resolution.set, &ProjectionOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Projection);
    }
}

#[test]
fn test_document_edited_after_resolve_is_skipped() {
    let ws = Workspace::new();
    ws.write("package", "workflows/plan.md", "---\nname: plan\n---\nplan\n");
    ws.write("package", "workflows/work.md", "---\nname: work\n---\nwork\n");

    let set = ws.resolver().resolve(None).unwrap();
    ws.write("package", "workflows/work.md", "---\nname: work\n");

    let projection = projector_for(Target::Qoder, &settings()).project(&set, &ProjectionOptions::default()).unwrap();
    assert_eq!(projection.counts.skipped, 1);
    assert_eq!(projection.capability_artifacts().count(), 1);
    assert_eq!(projection.skipped[0].code, ErrorCode::Config);
}

#[test]
fn test_projection_and_write_are_idempotent() {
    let ws = Workspace::new();
    ws.write("project", "workflows/plan.md", "---\nname: plan\ndescription: Plan\n---\nsteps\n");
    ws.write("user", "agents/research/historian.md", "---\nname: historian\ndescription: Digs\n---\nhistory\n");

    let resolver = ws.resolver();
    for target in Target::VALUES {
        let projector = projector_for(*target, &settings());
        let first = projector.project(&resolver.resolve(None).unwrap(), &ProjectionOptions::default()).unwrap();
        let second = projector.project(&resolver.resolve(None).unwrap(), &ProjectionOptions::default()).unwrap();
        assert_eq!(first.artifacts, second.artifacts);

        let out = ws.output(target.as_str());
        let written = write_artifacts(&out, &first.artifacts, &write_options()).unwrap();
        assert_eq!(written.written, first.artifacts.len());
        let rewritten = write_artifacts(&out, &second.artifacts, &write_options()).unwrap();
        assert_eq!(rewritten.unchanged, second.artifacts.len());
        assert_eq!(rewritten.written, 0);
    }
}
