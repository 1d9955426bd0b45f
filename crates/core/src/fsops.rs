//! Retrying file-system calls that map failures into [`Error::FileOperation`].

use crate::error::{Error, FileOp, Result};
use crate::guard::{RetryPolicy, is_transient_io, with_retry};
use std::fs;
use std::path::{Path, PathBuf};

/// Read a UTF-8 file.
pub fn read_to_string(path: &Path, policy: &RetryPolicy) -> Result<String> {
    with_retry(policy, is_transient_io, || fs::read_to_string(path)).map_err(|e| Error::file_op(FileOp::Read, path, e))
}

/// Write `contents`, creating parent directories first.
pub fn write(path: &Path, contents: &str, policy: &RetryPolicy) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent, policy)?;
    }
    with_retry(policy, is_transient_io, || fs::write(path, contents)).map_err(|e| Error::file_op(FileOp::Write, path, e))
}

pub fn create_dir_all(path: &Path, policy: &RetryPolicy) -> Result<()> {
    with_retry(policy, is_transient_io, || fs::create_dir_all(path))
        .map_err(|e| Error::file_op(FileOp::CreateDir, path, e))
}

/// Entries of a directory, sorted by file name so walks are deterministic.
pub fn list_dir(path: &Path, policy: &RetryPolicy) -> Result<Vec<PathBuf>> {
    with_retry(policy, is_transient_io, || {
        let mut entries = fs::read_dir(path)?.map(|entry| entry.map(|e| e.path())).collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    })
    .map_err(|e| Error::file_op(FileOp::ReadDir, path, e))
}

/// Read a file if it exists; `Ok(None)` when it does not.
pub fn read_if_exists(path: &Path, policy: &RetryPolicy) -> Result<Option<String>> {
    match read_to_string(path, policy) {
        Ok(content) => Ok(Some(content)),
        Err(Error::FileOperation(e)) if e.source.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parents_and_reads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("b").join("file.md");
        write(&path, "hello", &RetryPolicy::no_retry()).unwrap();
        assert_eq!(read_to_string(&path, &RetryPolicy::no_retry()).unwrap(), "hello");
    }

    #[test]
    fn test_read_missing_file_is_file_operation_error() {
        let temp = TempDir::new().unwrap();
        let err = read_to_string(&temp.path().join("missing.md"), &RetryPolicy::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FileOperation);
        assert!(err.is_recoverable());
        assert_eq!(err.context().get("op").map(String::as_str), Some("read"));
    }

    #[test]
    fn test_list_dir_is_sorted() {
        let temp = TempDir::new().unwrap();
        for name in ["c.md", "a.md", "b.md"] {
            fs::write(temp.path().join(name), "").unwrap();
        }
        let names: Vec<String> = list_dir(temp.path(), &RetryPolicy::no_retry())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md", "c.md"]);
    }

    #[test]
    fn test_list_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let err = list_dir(&temp.path().join("nope"), &RetryPolicy::no_retry()).unwrap_err();
        assert_eq!(err.context().get("op").map(String::as_str), Some("read-dir"));
    }

    #[test]
    fn test_read_if_exists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.json");
        assert_eq!(read_if_exists(&path, &RetryPolicy::no_retry()).unwrap(), None);
        fs::write(&path, "{}").unwrap();
        assert_eq!(read_if_exists(&path, &RetryPolicy::no_retry()).unwrap().as_deref(), Some("{}"));
    }
}
