//! Ties the snapshot cache, the method registry, the request counters, the
//! metrics, and the host collaborators together into the one object the
//! HTTP front-end and the periodic tick both share.

use std::path::PathBuf;
use std::sync::Arc;

use crate::counters::Counters;
use crate::host::{DirLister, MetricSource};
use crate::metrics::EngineMetrics;
use crate::registry::Registry;
use crate::snapshot::SnapshotCache;

/// Shared state reachable by every handler and by the HTTP layer.
///
/// Deliberately does not own the registry or the HTTP router; those are
/// transport concerns built on top of this state, not part of it (mirrors
/// the reference `RpcState`/`RpcServer` split).
pub struct EngineState {
    pub snapshot: SnapshotCache,
    pub dir_lister: Arc<dyn DirLister>,
    pub data_dir: PathBuf,
    pub counters: Counters,
    pub metrics: EngineMetrics,
    pub max_clients: u16,
}

impl EngineState {
    pub fn new(
        source: Arc<dyn MetricSource>,
        dir_lister: Arc<dyn DirLister>,
        data_dir: PathBuf,
        expiration_secs: u64,
        max_clients: u16,
    ) -> Self {
        Self {
            snapshot: SnapshotCache::new(source, expiration_secs),
            dir_lister,
            data_dir,
            counters: Counters::new(),
            metrics: EngineMetrics::new(),
            max_clients,
        }
    }

    /// Resolve `<data_dir>/<segments...>`, used by the directory handlers.
    pub fn resolve_dir(&self, segments: &[&str]) -> PathBuf {
        let mut path = self.data_dir.clone();
        for s in segments {
            path.push(s);
        }
        path
    }
}

/// The static method table, registered once at process start. New methods
/// are added here at compile time.
pub static METHODS: Registry = Registry::new(&[
    ("pw_get_status", crate::handlers::pw_get_status),
    ("pw_get_metric", crate::handlers::pw_get_metric),
    ("pw_get_dir_hosts", crate::handlers::pw_get_dir_hosts),
    ("pw_get_dir_plugins", crate::handlers::pw_get_dir_plugins),
    ("pw_get_dir_types", crate::handlers::pw_get_dir_types),
]);
