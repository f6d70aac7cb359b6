//! Diagnostic page snapshots — bounded on-disk retention.
//!
//! Snapshots are optional instrumentation captured at search/extract
//! transitions. Retention is bounded: once the directory holds more than
//! `max_snapshots` files, the oldest by modification time are pruned.

use crate::session::SessionTracker;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Separates session id from label in snapshot filenames. Two dashes,
/// because sanitized session ids (UUIDs) contain single dashes.
const NAME_SEPARATOR: &str = "--";

/// Reference to one stored snapshot, as exposed by `/diagnostics`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SnapshotRef {
    pub session_id: String,
    pub label: String,
    pub path: String,
}

/// Stores PNG snapshots under a directory, pruning oldest-first.
pub struct SnapshotStore {
    dir: PathBuf,
    max_snapshots: usize,
}

impl SnapshotStore {
    pub fn new(dir: PathBuf, max_snapshots: usize) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir: {}", dir.display()))?;
        Ok(Self {
            dir,
            max_snapshots: max_snapshots.max(1),
        })
    }

    /// Write one snapshot. Filename is `{session_id}--{label}.png`; a repeat
    /// capture for the same session and label overwrites.
    pub fn save(&self, session_id: &str, label: &str, png: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(format!(
            "{}{NAME_SEPARATOR}{}.png",
            sanitize(session_id),
            sanitize(label)
        ));
        fs::write(&path, png)
            .with_context(|| format!("failed to write snapshot: {}", path.display()))?;
        Ok(path)
    }

    /// List stored snapshots, newest first.
    pub fn list(&self) -> Vec<SnapshotRef> {
        let mut entries = self.entries_by_mtime();
        entries.reverse();
        entries
            .into_iter()
            .map(|(path, _)| snapshot_ref(&path))
            .collect()
    }

    /// Remove the oldest snapshots beyond the retention bound.
    ///
    /// Returns the number of files removed.
    pub fn prune(&self) -> usize {
        let entries = self.entries_by_mtime();
        if entries.len() <= self.max_snapshots {
            return 0;
        }
        let excess = entries.len() - self.max_snapshots;
        let mut removed = 0;
        for (path, _) in entries.into_iter().take(excess) {
            if fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!("pruned {removed} old snapshot(s)");
        }
        removed
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.entries_by_mtime().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// PNG files in the store, oldest modification time first.
    fn entries_by_mtime(&self) -> Vec<(PathBuf, SystemTime)> {
        let mut entries: Vec<(PathBuf, SystemTime)> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("png") {
                    return None;
                }
                let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((path, modified))
            })
            .collect();
        entries.sort_by_key(|(_, mtime)| *mtime);
        entries
    }
}

fn snapshot_ref(path: &Path) -> SnapshotRef {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let (session_id, label) = match stem.split_once(NAME_SEPARATOR) {
        Some((id, label)) => (id.to_string(), label.to_string()),
        None => (stem.to_string(), String::new()),
    };
    SnapshotRef {
        session_id,
        label,
        path: path.display().to_string(),
    }
}

/// Capture path used by the pipeline: writes the PNG and records the
/// resulting path on the live session, so `/diagnostics` can correlate
/// snapshots with the request that produced them. Failures are logged and
/// swallowed — snapshots are instrumentation, never a pipeline error.
#[derive(Clone)]
pub struct SnapshotRecorder {
    store: Arc<SnapshotStore>,
    tracker: Arc<SessionTracker>,
}

impl SnapshotRecorder {
    pub fn new(store: Arc<SnapshotStore>, tracker: Arc<SessionTracker>) -> Self {
        Self { store, tracker }
    }

    pub fn capture(&self, session_id: &str, label: &str, png: &[u8]) {
        match self.store.save(session_id, label, png) {
            Ok(path) => {
                self.tracker
                    .attach_snapshot(session_id, &path.display().to_string());
            }
            Err(e) => {
                tracing::debug!("snapshot save failed for {label}: {e}");
            }
        }
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().to_path_buf(), 50).unwrap();

        store.save("abcd1234", "search-duckduckgo", b"png").unwrap();
        let refs = store.list();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].session_id, "abcd1234");
        assert_eq!(refs[0].label, "search-duckduckgo");
    }

    #[test]
    fn test_uuid_session_id_survives_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().to_path_buf(), 50).unwrap();

        // Session ids contain dashes; they must not bleed into the label
        let id = "550e8400-e29b-41d4-a716-446655440000";
        store.save(id, "extract-fog-atlas-net", b"png").unwrap();
        let refs = store.list();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].session_id, id);
        assert_eq!(refs[0].label, "extract-fog-atlas-net");
    }

    #[test]
    fn test_recorder_attaches_path_to_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().to_path_buf(), 50).unwrap());
        let tracker = Arc::new(SessionTracker::new());
        let id = tracker.start("fog", None);

        let recorder = SnapshotRecorder::new(store, Arc::clone(&tracker));
        recorder.capture(&id, "search-duckduckgo", b"png");
        tracker.complete(&id);

        let diag = tracker.diagnostics();
        let snapshots = diag["recent"][0]["snapshots"].as_array().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].as_str().unwrap().ends_with(".png"));
    }

    #[test]
    fn test_prune_removes_oldest_beyond_bound() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().to_path_buf(), 3).unwrap();

        for i in 0..5 {
            let path = store.save("session0", &format!("page-{i}"), b"png").unwrap();
            // Stagger mtimes so ordering is deterministic
            let t = filetime_from_index(i);
            set_mtime(&path, t);
        }

        assert_eq!(store.len(), 5);
        assert_eq!(store.prune(), 2);
        assert_eq!(store.len(), 3);

        // The two oldest are gone
        let labels: Vec<String> = store.list().into_iter().map(|r| r.label).collect();
        assert!(!labels.contains(&"page-0".to_string()));
        assert!(!labels.contains(&"page-1".to_string()));
        assert!(labels.contains(&"page-4".to_string()));
    }

    #[test]
    fn test_prune_noop_under_bound() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().to_path_buf(), 10).unwrap();
        store.save("s", "only", b"png").unwrap();
        assert_eq!(store.prune(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        assert_eq!(sanitize("a/b\\c d"), "a-b-c-d");
    }

    fn filetime_from_index(i: usize) -> SystemTime {
        SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000 + i as u64 * 60)
    }

    fn set_mtime(path: &Path, t: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(t).unwrap();
    }
}
