//! Collaborator traits the engine reaches out through.
//!
//! The embedding metrics daemon's plugin-registration and value-dispatch
//! machinery is out of scope for this crate. The engine talks to it only
//! through these two narrow traits, the same kind of indirection used
//! elsewhere in this workspace to keep a library crate decoupled from the
//! process that embeds it.

use crate::error::EngineError;
use std::path::Path;

/// A point-in-time copy of the host's metric name index.
///
/// `names[i]` and `times[i]` are parallel: `times[i]` is the last-update
/// Unix timestamp (seconds) for `names[i]`.
pub struct RawNames {
    pub names: Vec<String>,
    pub times: Vec<i64>,
}

/// Produces a full copy of the host's live metric name index on demand.
///
/// Implemented by the embedding metrics daemon; this crate only ever calls
/// `get_names` from [`crate::snapshot::SnapshotCache::refresh`], never while
/// holding the snapshot table lock.
pub trait MetricSource: Send + Sync {
    fn get_names(&self) -> Result<RawNames, EngineError>;
}

/// Lists the entries of a directory, skipping `.` and `..`.
///
/// Exists so handlers can be tested against an in-memory fixture instead of
/// the real filesystem.
pub trait DirLister: Send + Sync {
    fn list(&self, path: &Path) -> Result<Vec<String>, EngineError>;
}

/// The production [`DirLister`]: reads the real filesystem.
#[derive(Default, Clone, Copy)]
pub struct FsDirLister;

impl DirLister for FsDirLister {
    fn list(&self, path: &Path) -> Result<Vec<String>, EngineError> {
        let entries = std::fs::read_dir(path).map_err(|e| EngineError::DirRead {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::DirRead {
                path: path.display().to_string(),
                source: e,
            })?;
            out.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_dir_lister_lists_real_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("a")).unwrap();
        std::fs::File::create(dir.path().join("b")).unwrap();
        let lister = FsDirLister;
        let mut names = lister.list(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn fs_dir_lister_errors_on_missing_dir() {
        let lister = FsDirLister;
        let err = lister.list(Path::new("/no/such/perfwatcher/dir")).unwrap_err();
        assert!(matches!(err, EngineError::DirRead { .. }));
    }
}
