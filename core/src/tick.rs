//! The periodic tick (C7): drives snapshot-cache refresh and publishes
//! self-metrics, independent of any in-flight HTTP request.
//!
//! A `tokio::spawn`ed loop around a `tokio::time::interval`, `select!`ing
//! against a `tokio::sync::broadcast` shutdown signal with the shutdown arm
//! `biased` so a pending shutdown always wins a tied wakeup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use crate::engine::EngineState;

/// Spawn the tick task. Returns its `JoinHandle`; the caller awaits it (or
/// drops it) during shutdown.
pub fn spawn(
    state: Arc<EngineState>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("periodic tick task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    tick_once(&state);
                }
            }
        }
    })
}

/// One tick: publish self-metrics, then refresh the snapshot cache, in that
/// order — the metrics published reflect the state *before* this tick's
/// refresh.
fn tick_once(state: &EngineState) {
    let stats = state.snapshot.stats();
    state.metrics.publish(
        state.counters.active_clients(),
        state.counters.new_connections(),
        state.counters.rpc_success(),
        state.counters.rpc_failure(),
        stats.ready_count,
        &stats.per_slot_ref,
        stats.current_entries,
    );
    debug!(
        ready_slots = stats.ready_count,
        current_entries = stats.current_entries,
        "tick: self-metrics published"
    );
    state.snapshot.refresh();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FsDirLister, MetricSource, RawNames};
    use std::time::Duration as StdDuration;

    struct FakeSource(Vec<&'static str>);
    impl MetricSource for FakeSource {
        fn get_names(&self) -> Result<RawNames, crate::error::EngineError> {
            Ok(RawNames {
                names: self.0.iter().map(|s| s.to_string()).collect(),
                times: vec![0; self.0.len()],
            })
        }
    }

    #[tokio::test]
    async fn tick_refreshes_and_publishes_metrics() {
        let state = Arc::new(EngineState::new(
            Arc::new(FakeSource(vec!["a/cpu/idle"])),
            Arc::new(FsDirLister),
            std::path::PathBuf::from("."),
            60,
            16,
        ));
        assert_eq!(state.snapshot.stats().ready_count, 0);
        tick_once(&state);
        assert_eq!(state.snapshot.stats().ready_count, 1);
        assert_eq!(state.metrics.snapshot_ready_slots.get(), 0);
    }

    #[tokio::test]
    async fn spawned_task_stops_on_shutdown_signal() {
        let state = Arc::new(EngineState::new(
            Arc::new(FakeSource(vec![])),
            Arc::new(FsDirLister),
            std::path::PathBuf::from("."),
            60,
            16,
        ));
        let (tx, rx) = broadcast::channel(1);
        let handle = spawn(state, StdDuration::from_secs(3600), rx);
        tx.send(()).unwrap();
        tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("tick task should shut down promptly")
            .unwrap();
    }
}
