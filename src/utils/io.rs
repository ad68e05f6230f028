//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

fn io_error(err: std::io::Error, operation: impl Into<String>) -> Error {
    Error::internal_io(err.to_string(), Some(operation.into()))
}

/// Read a UTF-8 file, mapping failures to `internal.io_error`.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| io_error(e, operation))
}

/// Write content to a file, creating missing parent directories.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(e, format!("{} (create dir)", operation)))?;
    }
    fs::write(path, content).map_err(|e| io_error(e, operation))
}

/// Move `from` to `to`, replacing any existing file.
pub fn rename_file(from: &Path, to: &Path, operation: &str) -> Result<()> {
    fs::rename(from, to).map_err(|e| io_error(e, operation))
}

/// Sibling path used while writing `path` atomically.
pub fn staging_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    Some(path.with_file_name(format!("{}.tmp", name.to_string_lossy())))
}

/// Write through a sibling `.tmp` file, then rename over `path`.
///
/// Readers see either the old content or the new content.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let staging = staging_path(path).ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    fs::write(&staging, content).map_err(|e| io_error(e, format!("{} (write temp)", operation)))?;
    fs::rename(&staging, path).map_err(|e| {
        let _ = fs::remove_file(&staging);
        io_error(e, format!("{} (rename)", operation))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "class Foo__s {{}}").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("Foo__s"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let err = read_file(Path::new("/nonexistent/path.swift"), "test read").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
        assert_eq!(err.details["context"], "test read");
    }

    #[test]
    fn write_file_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("maps/nested/map.txt");
        write_file(&target, "Data:\n", "test write").unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), "Data:\n");
    }

    #[test]
    fn staging_path_sits_next_to_target() {
        assert_eq!(
            staging_path(Path::new("App.xcodeproj/project.pbxproj")),
            Some(PathBuf::from("App.xcodeproj/project.pbxproj.tmp"))
        );
        assert_eq!(staging_path(Path::new("/")), None);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("project.pbxproj");
        fs::write(&target, "old").unwrap();

        write_file_atomic(&target, "new", "test atomic").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        assert!(!dir.path().join("project.pbxproj.tmp").exists());
    }
}
