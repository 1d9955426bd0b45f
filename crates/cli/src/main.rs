use anyhow::{Context, Result};
use capforge_adapters::{ProjectionOptions, ProjectorSettings, Target, WriteOptions, projector_for, write_artifacts};
use capforge_catalog::{CapabilityDocument, Resolver};
use capforge_core::{CONFIG_FILE, Config, ErrorRecord, LoggingSettings, init_logging, log_error, sanitize_path};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// capforge - project workflow and agent definitions into host tool formats
#[derive(Parser, Debug)]
#[command(name = "capforge")]
#[command(about = "Resolve workflow and agent definitions and project them for Claude, Cursor and Qoder", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to capforge.toml (default: ./capforge.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output and debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List resolved capabilities grouped by category
    List {
        /// Only show this category
        #[arg(long, value_name = "CATEGORY")]
        category: Option<String>,
    },
    /// Show one capability and where it was resolved from
    Show {
        /// Capability name
        #[arg(required = true, value_name = "NAME")]
        name: String,

        /// Prefer the capability in this category
        #[arg(long, value_name = "CATEGORY")]
        category: Option<String>,
    },
    /// Generate artifacts for a host tool
    Project {
        #[arg(value_enum, value_name = "TARGET")]
        target: TargetArg,

        /// Cursor: write a single .cursorrules file
        #[arg(long)]
        legacy: bool,

        /// Overwrite files whose content differs
        #[arg(long)]
        force: bool,

        /// Output directory (with `all`, the parent of each target's directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TargetArg {
    Claude,
    Cursor,
    Qoder,
    All,
}

impl TargetArg {
    fn targets(self) -> Vec<Target> {
        match self {
            TargetArg::Claude => vec![Target::Claude],
            TargetArg::Cursor => vec![Target::Cursor],
            TargetArg::Qoder => vec![Target::Qoder],
            TargetArg::All => Target::VALUES.to_vec(),
        }
    }
}

/// Counts reported at the end of every run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    merged: usize,
    written: usize,
    skipped: usize,
}

impl RunSummary {
    fn print(&self) {
        println!(
            "{} {} documents merged / {} artifacts written / {} skipped",
            "Summary:".bold(),
            self.merged,
            self.written,
            self.skipped
        );
    }
}

fn main() {
    let cli = Cli::parse();
    let mut summary = RunSummary::default();

    let result = run(cli, &mut summary);
    summary.print();

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(record) = record_failure(&e) {
            eprintln!("{} {}", "Suggestion:".yellow().bold(), record.code.suggestion());
        }
        std::process::exit(1);
    }
}

/// Emit an error record for a failure that ended the run.
fn record_failure(err: &anyhow::Error) -> Option<ErrorRecord> {
    err.downcast_ref::<capforge_core::Error>().map(log_error)
}

fn run(cli: Cli, summary: &mut RunSummary) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = load_config(&config_path)?;

    let mut logging = LoggingSettings::from(&config.logging);
    if cli.verbose {
        logging = logging.with_level("debug");
    }
    let _log_guard = init_logging(&logging)?;

    if cli.verbose {
        println!("{} Using config: {}", "Info:".blue().bold(), config_path.display());
    }

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let resolver = Resolver::from_config(&config, &working_dir)?;

    if cli.verbose {
        for root in resolver.roots() {
            println!("{} {} root: {}", "Info:".blue().bold(), root.tier, sanitize_path(&root.path));
        }
    }

    match cli.command {
        Commands::List { category } => cmd_list(&resolver, category.as_deref(), summary),
        Commands::Show { name, category } => cmd_show(&resolver, &name, category.as_deref(), summary),
        Commands::Project { target, legacy, force, output } => {
            let request = ProjectRequest { targets: target.targets(), legacy, force, output };
            cmd_project(&resolver, &config, &request, &working_dir, summary)
        }
    }
}

/// Load config from file, defaults when the file does not exist
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        println!("{} Config not found at {}, using defaults", "Warning:".yellow().bold(), path.display());
    }
    Ok(Config::load_or_default(path)?)
}

fn cmd_list(resolver: &Resolver, category: Option<&str>, summary: &mut RunSummary) -> Result<()> {
    let resolution = resolver.resolve_report(category)?;
    summary.merged = resolution.set.len();
    summary.skipped = resolution.skipped.len();

    if resolution.set.is_empty() {
        println!("{} No capabilities found", "Info:".yellow().bold());
        return Ok(());
    }

    for (category, documents) in resolution.set.by_category() {
        println!("{}", category.green().bold().underline());
        for doc in &documents {
            println!(
                "  {} {} [{}] {}",
                doc.name.cyan(),
                format!("({})", doc.kind).dimmed(),
                doc.tier,
                doc.description_or("")
            );
        }
        println!();
    }

    Ok(())
}

fn cmd_show(resolver: &Resolver, name: &str, category: Option<&str>, summary: &mut RunSummary) -> Result<()> {
    let doc = resolver.lookup(name, category)?;
    summary.merged = 1;
    print_document(&doc);
    Ok(())
}

fn print_document(doc: &CapabilityDocument) {
    println!("{} {}", "Name:".blue().bold(), doc.name.cyan());
    println!("{} {}", "Kind:".blue().bold(), doc.kind);
    println!("{} {}", "Category:".blue().bold(), doc.category);
    println!("{} {}", "Tier:".blue().bold(), doc.tier);
    println!("{} {}", "Source:".blue().bold(), sanitize_path(&doc.source_path));
    if let Some(description) = &doc.description {
        println!("{} {}", "Description:".blue().bold(), description);
    }
    if let Some(hint) = &doc.argument_hint {
        println!("{} {}", "Arguments:".blue().bold(), hint);
    }
    if !doc.frameworks.is_empty() {
        println!("{} {}", "Frameworks:".blue().bold(), doc.frameworks.join(", "));
    }
    for (key, value) in &doc.extra {
        println!("{} {} = {}", "Extra:".blue().bold(), key, value.joined());
    }
    println!();
    println!("{}", doc.body.trim());
}

#[derive(Debug)]
struct ProjectRequest {
    targets: Vec<Target>,
    legacy: bool,
    force: bool,
    output: Option<PathBuf>,
}

impl ProjectRequest {
    /// `--output` names the directory for a single target and the parent directory for several.
    fn output_dir(&self, target: Target, config: &Config, working_dir: &Path) -> PathBuf {
        let dir = match (&self.output, self.targets.len()) {
            (Some(output), 1) => output.clone(),
            (Some(output), _) => output.join(target.default_output_dir()),
            (None, _) => target.output_dir(&config.targets),
        };
        if dir.is_absolute() { dir } else { working_dir.join(dir) }
    }
}

fn cmd_project(
    resolver: &Resolver, config: &Config, request: &ProjectRequest, working_dir: &Path, summary: &mut RunSummary,
) -> Result<()> {
    let resolution = resolver.resolve_report(None)?;
    summary.merged = resolution.set.len();
    summary.skipped = resolution.skipped.len();

    let settings = ProjectorSettings::from(config);
    let options = ProjectionOptions { legacy: request.legacy };
    let write_options = WriteOptions { force: request.force, retry: config.retry };

    for target in &request.targets {
        let projection = projector_for(*target, &settings).project(&resolution.set, &options)?;
        summary.skipped += projection.counts.skipped;

        let output = request.output_dir(*target, config, working_dir);
        let written = write_artifacts(&output, &projection.artifacts, &write_options)?;
        summary.written += written.written;
        summary.skipped += written.skipped;

        println!(
            "{} {}: {} written, {} unchanged, {} skipped -> {}",
            "Success:".green().bold(),
            target.as_str().cyan(),
            written.written,
            written.unchanged,
            written.skipped,
            sanitize_path(&output)
        );
        if written.skipped > 0 && !request.force {
            println!("{} Re-run with --force to overwrite files that differ", "Info:".yellow().bold());
        }
    }

    Ok(())
}
