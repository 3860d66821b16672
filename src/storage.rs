// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for the private segment directory

use crate::constants::{APP_DIR, SEGMENT_FILE_PREFIX, SEGMENTS_DIR};
use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default working directory: `<cache_dir>/camera-segments/segments`
///
/// Falls back to the system temp directory when no cache dir is known.
pub fn default_working_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(SEGMENTS_DIR)
}

/// Create the working directory if needed
pub fn ensure_working_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// A fresh, unique segment file path inside `dir`
///
/// `VID_SEGMENT_<timestamp>_<unique>.<ext>`; the timestamp keeps segments
/// sortable, the suffix keeps two segments from the same millisecond apart.
pub fn segment_path(dir: &Path, extension: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S%3f");
    let unique = uuid::Uuid::new_v4().simple().to_string();
    let name = format!(
        "{}{}_{}.{}",
        SEGMENT_FILE_PREFIX,
        timestamp,
        &unique[..8],
        extension
    );
    dir.join(name)
}

/// Whether a path names a segment file produced by this crate
pub fn is_segment_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(SEGMENT_FILE_PREFIX))
}

/// Remove a file, treating an already-missing file as success
///
/// Returns whether a file was actually removed.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Delete every leftover segment file in `dir`
///
/// Returns how many files were removed. A missing directory counts as empty.
pub fn purge_segments(dir: &Path) -> io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_segment_file(&path) {
            continue;
        }
        match remove_file_if_exists(&path) {
            Ok(true) => {
                debug!(path = %path.display(), "Removed leftover segment");
                removed += 1;
            }
            Ok(false) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove segment"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_paths_are_unique() {
        let dir = Path::new("/tmp/segments");
        let a = segment_path(dir, "mp4");
        let b = segment_path(dir, "mp4");
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(dir));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("mp4"));
        assert!(is_segment_file(&a));
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp4");
        assert!(!remove_file_if_exists(&path).unwrap());

        std::fs::write(&path, b"x").unwrap();
        assert!(remove_file_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_purge_only_touches_segments() {
        let dir = tempfile::tempdir().unwrap();
        let seg = segment_path(dir.path(), "mp4");
        let other = dir.path().join("notes.txt");
        std::fs::write(&seg, b"seg").unwrap();
        std::fs::write(&other, b"keep").unwrap();

        assert_eq!(purge_segments(dir.path()).unwrap(), 1);
        assert!(!seg.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_purge_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(purge_segments(&dir.path().join("nope")).unwrap(), 0);
    }
}
