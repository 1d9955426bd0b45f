//! Shared plumbing for capforge: the error taxonomy, the execution guard that wraps
//! every file-system call, configuration and logging.

pub mod config;
pub mod error;
pub mod fsops;
pub mod guard;
pub mod logging;

pub use config::{CONFIG_FILE, Config, ConfigError, DEFAULT_CATEGORIES, ManifestConfig, RootPaths};
pub use error::{CapabilityLookupError, Error, ErrorCode, ErrorRecord, FileOp, FileOpError, Result, Severity, log_error};
pub use guard::{Guarded, RetryPolicy, guard, is_retryable, is_transient_io, safe_execute, with_retry};
pub use logging::{LogFormat, LoggingSettings, init_logging, sanitize_path};
