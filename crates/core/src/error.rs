use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for capforge-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the resolver and every projector
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed metadata block or configuration file
    #[error("configuration error: {message}{}", location_suffix(.line, .column))]
    Config { message: String, path: Option<PathBuf>, line: Option<usize>, column: Option<usize> },

    /// A file-system operation failed
    #[error("file operation error: {0}")]
    FileOperation(#[from] FileOpError),

    /// No capability matched after the tier merge
    #[error("capability lookup error: {0}")]
    CapabilityLookup(#[from] CapabilityLookupError),

    /// A projector produced no capability artifacts
    #[error("projection error ({target}): {message}")]
    Projection { target: String, message: String },

    /// Invariant violation
    #[error("critical error: {0}")]
    Critical(String),
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
        (Some(line), None) => format!(" (line {line})"),
        _ => String::new(),
    }
}

/// Kind of file-system operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileOp {
    Read,
    ReadDir,
    Write,
    CreateDir,
}

impl FileOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileOp::Read => "read",
            FileOp::ReadDir => "read-dir",
            FileOp::Write => "write",
            FileOp::CreateDir => "create-dir",
        }
    }

    /// Reads may be skipped; writes abort the current artifact.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FileOp::Read | FileOp::ReadDir)
    }
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File-system failure with the operation and path that caused it
#[derive(Debug, Error)]
#[error("{op} failed for {}: {source}", .path.display())]
pub struct FileOpError {
    pub op: FileOp,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Lookup miss, carrying every root that was searched
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{name}' not found{} (searched: {})", category_suffix(.category), display_roots(.searched))]
pub struct CapabilityLookupError {
    pub name: String,
    pub category: Option<String>,
    pub searched: Vec<PathBuf>,
}

fn category_suffix(category: &Option<String>) -> String {
    category.as_ref().map(|c| format!(" in category '{c}'")).unwrap_or_default()
}

fn display_roots(roots: &[PathBuf]) -> String {
    roots.iter().map(|r| r.display().to_string()).collect::<Vec<_>>().join(", ")
}

impl Error {
    /// Malformed content without position information
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config { message: message.into(), path: None, line: None, column: None }
    }

    /// Malformed content at a known position
    pub fn config_at(message: impl Into<String>, line: usize, column: Option<usize>) -> Self {
        Error::Config { message: message.into(), path: None, line: Some(line), column }
    }

    pub fn file_op(op: FileOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileOperation(FileOpError { op, path: path.into(), source })
    }

    pub fn projection(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Projection { target: target.into(), message: message.into() }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Error::Critical(message.into())
    }

    /// Attach the offending document path to a config error
    pub fn with_path(self, source_path: impl Into<PathBuf>) -> Self {
        match self {
            Error::Config { message, line, column, .. } => {
                Error::Config { message, path: Some(source_path.into()), line, column }
            }
            other => other,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Config { .. } => ErrorCode::Config,
            Error::FileOperation(_) => ErrorCode::FileOperation,
            Error::CapabilityLookup(_) => ErrorCode::CapabilityLookup,
            Error::Projection { .. } => ErrorCode::Projection,
            Error::Critical(_) => ErrorCode::Critical,
        }
    }

    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config { .. } => true,
            Error::FileOperation(e) => e.op.is_recoverable(),
            Error::CapabilityLookup(_) | Error::Projection { .. } | Error::Critical(_) => false,
        }
    }

    /// Structured context for the error log
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut context = BTreeMap::new();
        match self {
            Error::Config { path, line, column, .. } => {
                if let Some(path) = path {
                    context.insert("path".to_string(), path.display().to_string());
                }
                if let Some(line) = line {
                    context.insert("line".to_string(), line.to_string());
                }
                if let Some(column) = column {
                    context.insert("column".to_string(), column.to_string());
                }
            }
            Error::FileOperation(e) => {
                context.insert("op".to_string(), e.op.to_string());
                context.insert("path".to_string(), e.path.display().to_string());
                context.insert("io_kind".to_string(), format!("{:?}", e.source.kind()));
            }
            Error::CapabilityLookup(e) => {
                context.insert("name".to_string(), e.name.clone());
                if let Some(category) = &e.category {
                    context.insert("category".to_string(), category.clone());
                }
                context.insert("searched".to_string(), display_roots(&e.searched));
            }
            Error::Projection { target, .. } => {
                context.insert("target".to_string(), target.clone());
            }
            Error::Critical(_) => {}
        }
        context
    }
}

/// Stable identifier for each error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "CONFIG_ERROR")]
    Config,
    #[serde(rename = "FILE_OPERATION_ERROR")]
    FileOperation,
    #[serde(rename = "CAPABILITY_LOOKUP_ERROR")]
    CapabilityLookup,
    #[serde(rename = "PROJECTION_ERROR")]
    Projection,
    #[serde(rename = "CRITICAL_ERROR")]
    Critical,
}

impl ErrorCode {
    pub const VALUES: &[ErrorCode] = &[
        ErrorCode::Config,
        ErrorCode::FileOperation,
        ErrorCode::CapabilityLookup,
        ErrorCode::Projection,
        ErrorCode::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Config => "CONFIG_ERROR",
            ErrorCode::FileOperation => "FILE_OPERATION_ERROR",
            ErrorCode::CapabilityLookup => "CAPABILITY_LOOKUP_ERROR",
            ErrorCode::Projection => "PROJECTION_ERROR",
            ErrorCode::Critical => "CRITICAL_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::Config => Severity::Low,
            ErrorCode::FileOperation | ErrorCode::CapabilityLookup => Severity::Medium,
            ErrorCode::Projection => Severity::High,
            ErrorCode::Critical => Severity::Fatal,
        }
    }

    /// What the user can do about it, printed by the dispatcher
    pub fn suggestion(&self) -> &'static str {
        match self {
            ErrorCode::Config => "Check the reported line: metadata blocks open and close with `---` and hold `key: value` pairs; capforge.toml must be valid TOML.",
            ErrorCode::FileOperation => "Verify the path exists and is readable/writable; run the bootstrap step if a precedence root is missing.",
            ErrorCode::CapabilityLookup => "Run `capforge list` to see available capabilities, or check the name and category spelling.",
            ErrorCode::Projection => "No capability could be projected; fix the skipped documents reported above and run again.",
            ErrorCode::Critical => "This is a bug in capforge; re-run with CAPFORGE_LOG=debug and report the output.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged failure, kept for diagnostics and summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub severity: Severity,
    pub recoverable: bool,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Build a record from an error without emitting it
    pub fn from_error(error: &Error) -> Self {
        Self {
            code: error.code(),
            severity: error.severity(),
            recoverable: error.is_recoverable(),
            message: error.to_string(),
            context: error.context(),
            timestamp: Utc::now(),
        }
    }

    /// Add a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Emit the record on the `capforge::errors` target.
    pub fn emit(&self) {
        let context = serde_json::to_string(&self.context).unwrap_or_default();
        if self.recoverable {
            tracing::warn!(
                target: "capforge::errors",
                code = %self.code,
                severity = %self.severity,
                recoverable = self.recoverable,
                context = %context,
                "{}",
                self.message
            );
        } else {
            tracing::error!(
                target: "capforge::errors",
                code = %self.code,
                severity = %self.severity,
                recoverable = self.recoverable,
                context = %context,
                "{}",
                self.message
            );
        }
    }
}

/// Turn an error into a record and append it to the structured log.
pub fn log_error(error: &Error) -> ErrorRecord {
    let record = ErrorRecord::from_error(error);
    record.emit();
    record
}
