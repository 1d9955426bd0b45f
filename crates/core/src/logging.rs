//! Logging built on the tracing ecosystem.
//!
//! Error records are emitted on the `capforge::errors` target (see
//! [`crate::error::ErrorRecord::emit`]); enabling the JSON file log keeps them on disk.
//!
//! # Environment Variables
//!
//! - `CAPFORGE_LOG`: Filter directive (like `RUST_LOG`), e.g. `capforge=debug`
//! - `CAPFORGE_LOG_FORMAT`: Output format for stderr: `pretty`, `json`, `compact`
//! - `CAPFORGE_LOG_DIR`: Directory for the JSON file log (default `~/.capforge/logs`)
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! level = "warn"
//! format = "auto"
//!
//! [logging.file]
//! enabled = true
//! level = "info"
//! ```

use crate::config::LoggingConfig as ConfigLoggingConfig;
use crate::error::{Error, Result};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format for stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Pretty, human-readable output with colors (default for TTY)
    #[default]
    Pretty,
    /// JSON output (one line per event)
    Json,
    /// Compact, single-line output
    Compact,
}

impl LogFormat {
    pub const VALUES: &[LogFormat] = &[LogFormat::Pretty, LogFormat::Json, LogFormat::Compact];

    /// Parse a log format from a string. `auto` and unknown values are `None`.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

/// Resolved logging settings
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default filter for stderr output.
    pub level: String,
    /// Output format for stderr; `None` picks by TTY.
    pub format: Option<LogFormat>,
    /// Filter for the JSON file log, when enabled.
    pub file_level: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: None, file_level: None }
    }
}

impl From<&ConfigLoggingConfig> for LoggingSettings {
    fn from(config: &ConfigLoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: LogFormat::parse_str(&config.format),
            file_level: config.file.enabled.then(|| config.file.level.clone()),
        }
    }
}

impl LoggingSettings {
    /// Set the log level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Build an EnvFilter from this config and environment variables.
    fn build_env_filter(&self) -> EnvFilter {
        let filter = env::var("CAPFORGE_LOG")
            .ok()
            .or_else(|| env::var("RUST_LOG").ok())
            .unwrap_or_else(|| self.level.clone());

        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Environment override first, then configured format, then TTY detection.
    fn detect_format(&self) -> LogFormat {
        if let Ok(fmt_str) = env::var("CAPFORGE_LOG_FORMAT")
            && let Some(fmt) = LogFormat::parse_str(&fmt_str)
        {
            return fmt;
        }

        if let Some(format) = self.format {
            return format;
        }

        if atty::is(atty::Stream::Stderr) { LogFormat::Pretty } else { LogFormat::Compact }
    }

    /// Get the log directory path.
    fn log_dir() -> Result<PathBuf> {
        if let Ok(custom_dir) = env::var("CAPFORGE_LOG_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }

        dirs::home_dir()
            .map(|home| home.join(".capforge").join("logs"))
            .ok_or_else(|| Error::config("could not determine home directory for the log file"))
    }
}

/// Install the global subscriber.
///
/// Returns the file appender guard when file logging is enabled; keep it alive until
/// the process exits so buffered records are flushed.
pub fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let stderr_layer = match settings.detect_format() {
        LogFormat::Pretty => fmt::layer().pretty().with_writer(io::stderr).with_ansi(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(io::stderr).boxed(),
        LogFormat::Compact => {
            fmt::layer().compact().with_writer(io::stderr).with_ansi(atty::is(atty::Stream::Stderr)).boxed()
        }
    };
    let stderr_layer = stderr_layer.with_filter(settings.build_env_filter());

    let Some(file_level) = &settings.file_level else {
        Registry::default()
            .with(stderr_layer)
            .try_init()
            .map_err(|e| Error::config(format!("failed to install logger: {e}")))?;
        return Ok(None);
    };

    let log_dir = LoggingSettings::log_dir()?;
    crate::fsops::create_dir_all(&log_dir, &crate::guard::RetryPolicy::default())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "capforge.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    Registry::default()
        .with(stderr_layer)
        .with(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(file_level)),
        )
        .try_init()
        .map_err(|e| Error::config(format!("failed to install logger: {e}")))?;

    Ok(Some(guard))
}

/// Sanitize file paths for display (home directory becomes `~`).
pub fn sanitize_path(path: &std::path::Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }

    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileLoggingConfig, LoggingConfig};

    #[test]
    fn test_log_format_from_str() {
        assert_eq!(LogFormat::parse_str("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse_str("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse_str("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse_str("invalid"), None);
    }

    #[test]
    fn test_log_format_as_str_round_trips() {
        for format in LogFormat::VALUES {
            assert_eq!(LogFormat::parse_str(format.as_str()), Some(*format));
        }
    }

    #[test]
    fn test_settings_from_config() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            file: FileLoggingConfig { enabled: true, level: "trace".to_string() },
        };
        let settings = LoggingSettings::from(&config);
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.format, Some(LogFormat::Json));
        assert_eq!(settings.file_level.as_deref(), Some("trace"));
    }

    #[test]
    fn test_settings_file_disabled() {
        let settings = LoggingSettings::from(&LoggingConfig::default());
        assert_eq!(settings.level, "warn");
        assert_eq!(settings.format, None);
        assert!(settings.file_level.is_none());
    }

    #[test]
    fn test_settings_builder() {
        let settings = LoggingSettings::default().with_level("info").with_format(LogFormat::Compact);
        assert_eq!(settings.level, "info");
        assert_eq!(settings.format, Some(LogFormat::Compact));
    }

    #[test]
    fn test_sanitize_path() {
        let abs_path = PathBuf::from("/var/log/test.log");
        assert_eq!(sanitize_path(&abs_path), "/var/log/test.log");

        if let Some(home) = dirs::home_dir() {
            let inside = home.join("work").join("file.md");
            assert_eq!(sanitize_path(&inside), "~/work/file.md");
        }
    }
}
