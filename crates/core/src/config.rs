use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::guard::RetryPolicy;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "capforge.toml";

/// Category directories recognised when no config overrides them
pub const DEFAULT_CATEGORIES: &[&str] = &["review", "research", "design", "workflow", "docs"];

/// Root configuration structure for capforge.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Precedence roots
    pub roots: RootsConfig,

    /// Directory walk and category inference
    pub resolver: ResolverConfig,

    /// File-system retry policy
    pub retry: RetryPolicy,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Identity written into the Claude plugin manifest
    pub manifest: ManifestConfig,

    /// Per-target output directory overrides
    pub targets: TargetsConfig,
}

/// The three precedence roots. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RootsConfig {
    pub project: PathBuf,
    /// Defaults to `~/.capforge`
    pub user: Option<PathBuf>,
    /// Shipped capability set; has no default
    pub package: Option<PathBuf>,
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self { project: PathBuf::from(".capforge"), user: None, package: None }
    }
}

/// Root paths in precedence order, resolved against a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPaths {
    pub project: PathBuf,
    pub user: PathBuf,
    pub package: PathBuf,
}

impl RootsConfig {
    pub fn default_user_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".capforge"))
    }

    /// Resolve all three roots; fails if the user or package root cannot be determined
    pub fn resolve(&self, base: &Path) -> Result<RootPaths> {
        let user = self
            .user
            .clone()
            .or_else(Self::default_user_root)
            .ok_or_else(|| Error::from(ConfigError::MissingRoot("user")))?;
        let package = self.package.clone().ok_or_else(|| Error::from(ConfigError::MissingRoot("package")))?;

        Ok(RootPaths {
            project: absolutize(base, &self.project),
            user: absolutize(base, &user),
            package: absolutize(base, &package),
        })
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Known category names; anything else is "uncategorized"
    pub categories: Vec<String>,
    /// File extension of capability documents (without the dot)
    pub extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(), extension: "md".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter for stderr output
    pub level: String,
    /// Stderr format: auto, pretty, json, compact. `auto` picks by TTY.
    pub format: String,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: "auto".to_string(), file: FileLoggingConfig::default() }
    }
}

/// JSON file log; doubles as the persistent error log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self { enabled: false, level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestConfig {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            name: "capforge".to_string(),
            version: "0.1.0".to_string(),
            description: "Workflows and agents generated by capforge".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetsConfig {
    pub claude: Option<PathBuf>,
    pub cursor: Option<PathBuf>,
    pub qoder: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::toml_parse(&e, toml_str))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = crate::fsops::read_to_string(path, &RetryPolicy::default())?;
        Self::from_toml_str(&content).map_err(|e| e.with_path(path))
    }

    /// Load `path` when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match crate::fsops::read_if_exists(path, &RetryPolicy::default())? {
            Some(content) => Self::from_toml_str(&content).map_err(|e| e.with_path(path)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.resolver.categories.is_empty() {
            return Err(ConfigError::Invalid("resolver.categories must not be empty".to_string()).into());
        }
        if self.resolver.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid("resolver.categories must not contain blank names".to_string()).into());
        }
        if self.resolver.extension.trim().is_empty() || self.resolver.extension.starts_with('.') {
            return Err(ConfigError::Invalid("resolver.extension must be a bare extension like \"md\"".to_string()).into());
        }
        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "auto" | "pretty" | "json" | "compact") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be auto, pretty, json or compact, got \"{}\"",
                self.logging.format
            ))
            .into());
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()).into());
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid("retry.backoff_multiplier must be >= 1.0".to_string()).into());
        }
        Ok(())
    }

    /// Get example configuration (as a string)
    pub fn example() -> &'static str {
        r#"# capforge configuration
# Only roots.package has no default.

[roots]
# Highest precedence; relative to the working directory
project = ".capforge"
# Defaults to ~/.capforge
# user = "/home/me/.capforge"
# Shipped capability set (required)
package = "/usr/local/share/capforge"

[resolver]
categories = ["review", "research", "design", "workflow", "docs"]
extension = "md"

[retry]
max_attempts = 3
initial_delay_ms = 50
backoff_multiplier = 2.0

[logging]
level = "warn"
# auto (pretty on a terminal, compact otherwise), pretty, json or compact
format = "auto"

[logging.file]
enabled = false
level = "info"

[manifest]
name = "capforge"
version = "0.1.0"
description = "Workflows and agents generated by capforge"

[targets]
# claude = "dist/claude"
# cursor = ".cursor"
# qoder = ".qoder/commands"
"#
    }
}

/// Configuration-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} root is not configured")]
    MissingRoot(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("TOML parse error: {message}")]
    TomlParse { message: String, line: Option<usize>, column: Option<usize> },
}

impl ConfigError {
    fn toml_parse(err: &toml::de::Error, source: &str) -> Self {
        let (line, column) = err.span().map(|span| line_col(source, span.start)).unzip();
        ConfigError::TomlParse { message: err.message().to_string(), line, column }
    }
}

/// 1-based line and column of a byte offset
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, column)
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::TomlParse { line: Some(line), column, .. } => Error::config_at(err.to_string(), *line, *column),
            _ => Error::config(err.to_string()),
        }
    }
}
