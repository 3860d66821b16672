// SPDX-License-Identifier: GPL-3.0-only

//! Ordered record of the segment files of one recording

use crate::storage;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The file produced by one open-camera episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    /// Orientation tag in degrees, applied by players
    pub rotation: i32,
}

impl Segment {
    pub fn new(path: PathBuf, rotation: i32) -> Self {
        Self { path, rotation }
    }
}

/// Non-UTF-8 paths are written with replacement characters rather than failing
fn serialize_path_lossy<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// Segments in recording order
///
/// Segments are shared, never copied, and never reordered.
#[derive(Debug, Default)]
pub struct SegmentLedger {
    segments: Vec<Arc<Segment>>,
}

impl SegmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, segment: Segment) -> Arc<Segment> {
        let segment = Arc::new(segment);
        self.segments.push(Arc::clone(&segment));
        segment
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn snapshot(&self) -> Vec<Arc<Segment>> {
        self.segments.clone()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Best-effort unlink of every referenced file, then clear
    ///
    /// Missing files are ignored; other failures are logged. Returns the
    /// number of files removed.
    pub fn delete_all_files(&mut self) -> usize {
        let mut removed = 0;
        for segment in &self.segments {
            match storage::remove_file_if_exists(&segment.path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %segment.path.display(), error = %e, "Failed to delete segment")
                }
            }
        }
        debug!(removed, total = self.segments.len(), "Deleted segment files");
        self.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_keeps_order() {
        let mut ledger = SegmentLedger::new();
        ledger.append(Segment::new(PathBuf::from("a.mp4"), 90));
        ledger.append(Segment::new(PathBuf::from("b.mp4"), 270));

        let paths: Vec<_> = ledger.snapshot().iter().map(|s| s.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")]);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_snapshot_shares_segments() {
        let mut ledger = SegmentLedger::new();
        let appended = ledger.append(Segment::new(PathBuf::from("a.mp4"), 0));
        assert!(Arc::ptr_eq(&appended, &ledger.snapshot()[0]));
    }

    #[test]
    fn test_delete_all_files_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.mp4");
        std::fs::write(&present, b"data").unwrap();

        let mut ledger = SegmentLedger::new();
        ledger.append(Segment::new(present.clone(), 90));
        ledger.append(Segment::new(dir.path().join("missing.mp4"), 90));

        assert_eq!(ledger.delete_all_files(), 1);
        assert!(!present.exists());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_segment_serializes_as_path_and_rotation() {
        let segment = Segment::new(PathBuf::from("/tmp/a.mp4"), 270);
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(json, serde_json::json!({"path": "/tmp/a.mp4", "rotation": 270}));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_serializes_lossily() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/tmp").join(OsStr::from_bytes(b"VID_SEGMENT_\xff.mp4"));
        let json = serde_json::to_value(Segment::new(path, 90)).unwrap();
        assert_eq!(json["path"], "/tmp/VID_SEGMENT_\u{fffd}.mp4");
        assert_eq!(json["rotation"], 90);
    }
}
