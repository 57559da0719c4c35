//! The ref-counted snapshot cache.
//!
//! A fixed-size table of slots holds immutable point-in-time copies of the
//! host's metric name index. At most one slot is ever "current" (the ready
//! slot with the greatest `update_time`); readers borrow it via
//! [`SnapshotHandle`], whose `Arc` strong count *is* the slot's reference
//! count, the idiomatic stand-in for the source's manual `ref`
//! increment/decrement discipline.
//!
//! The table-metadata mutex is held only for O(1) bookkeeping; the slow
//! `get_names` call that actually populates a slot runs with the lock
//! released, so a refresh never stalls a concurrent reader.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

use crate::host::MetricSource;

/// Number of slots in the snapshot table. Sized so that, under bounded
/// handler duration, "no free slot" is unreachable in practice.
pub const SNAPSHOT_SLOTS: usize = 6;

/// An immutable, point-in-time copy of the metric name index.
pub struct SnapshotData {
    pub names: Vec<String>,
    pub times: Vec<i64>,
    pub count: usize,
}

struct Slot {
    ready: bool,
    update_time: i64,
    data: Option<Arc<SnapshotData>>,
}

impl Slot {
    const fn empty() -> Self {
        Slot {
            ready: false,
            update_time: 0,
            data: None,
        }
    }

    /// Number of outstanding readers: the slot's own `Arc` clone doesn't
    /// count as a reader, so subtract one when the slot holds data.
    fn ref_count(&self) -> usize {
        self.data
            .as_ref()
            .map(|d| Arc::strong_count(d).saturating_sub(1))
            .unwrap_or(0)
    }
}

/// A borrowed reference to a ready snapshot.
///
/// Dropping it is the handle's release step; ownership makes the
/// "decrement ref" step automatic and panic-safe.
#[derive(Clone)]
pub struct SnapshotHandle {
    data: Arc<SnapshotData>,
}

impl SnapshotHandle {
    pub fn names(&self) -> &[String] {
        &self.data.names
    }

    pub fn times(&self) -> &[i64] {
        &self.data.times
    }

    pub fn count(&self) -> usize {
        self.data.count
    }
}

/// Snapshot of the table's internal bookkeeping, for the periodic tick's
/// self-metrics.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotStats {
    pub ready_count: usize,
    pub per_slot_ref: [usize; SNAPSHOT_SLOTS],
    pub current_entries: usize,
}

pub struct SnapshotCache {
    slots: Mutex<[Slot; SNAPSHOT_SLOTS]>,
    expiration_secs: i64,
    source: Arc<dyn MetricSource>,
    refreshing: AtomicBool,
    clock: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn MetricSource>, expiration_secs: u64) -> Self {
        Self::with_clock(source, expiration_secs, Box::new(real_clock))
    }

    /// Construct with an injectable clock, so tests can control the passage
    /// of "wall time" without sleeping real seconds.
    pub fn with_clock(
        source: Arc<dyn MetricSource>,
        expiration_secs: u64,
        clock: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            slots: Mutex::new(std::array::from_fn(|_| Slot::empty())),
            expiration_secs: expiration_secs as i64,
            source,
            refreshing: AtomicBool::new(false),
            clock,
        }
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Index of the `ready` slot with the greatest `update_time`. Ties are
    /// broken by lowest index.
    fn current_index(slots: &[Slot; SNAPSHOT_SLOTS]) -> Option<usize> {
        slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.ready)
            .max_by_key(|(i, s)| (s.update_time, std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
    }

    /// Idempotent refresh, called by the periodic tick.
    ///
    /// If another refresh is already in flight (e.g. a test calling this
    /// concurrently with the tick task), this call is a no-op. At most one
    /// slot may be populated at a time, and a concurrent refresh would just
    /// redo the same work once the first one completes.
    pub fn refresh(&self) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let _guard = RefreshGuard(&self.refreshing);

        let now = self.now();
        let target_slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            let current = Self::current_index(&slots);

            for i in 0..SNAPSHOT_SLOTS {
                if slots[i].ready && Some(i) != current && slots[i].ref_count() == 0 {
                    slots[i].data = None;
                    slots[i].ready = false;
                    slots[i].update_time = 0;
                }
            }

            let needs_update = match current {
                None => true,
                Some(i) => now - slots[i].update_time >= self.expiration_secs,
            };
            if !needs_update {
                return;
            }

            match (0..SNAPSHOT_SLOTS).find(|&i| !slots[i].ready) {
                Some(i) => i,
                None => {
                    error!("snapshot table exhausted: no free slot available for refresh");
                    return;
                }
            }
        };

        let raw = match self.source.get_names() {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "get_names failed during snapshot refresh");
                return;
            }
        };
        let count = raw.names.len();
        let data = Arc::new(SnapshotData {
            names: raw.names,
            times: raw.times,
            count,
        });

        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots[target_slot].data = Some(data);
        slots[target_slot].update_time = now;
        slots[target_slot].ready = true;
        debug!(slot = target_slot, entries = count, "snapshot refreshed");
    }

    /// Borrow the current snapshot, if one is ready. Returns `None` as the
    /// "not available" sentinel otherwise.
    pub fn acquire(&self) -> Option<SnapshotHandle> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let idx = Self::current_index(&slots)?;
        let data = slots[idx].data.clone()?;
        Some(SnapshotHandle { data })
    }

    /// Internal bookkeeping snapshot, used by the periodic tick to publish
    /// self-metrics.
    pub fn stats(&self) -> SnapshotStats {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let mut per_slot_ref = [0usize; SNAPSHOT_SLOTS];
        let mut ready_count = 0;
        for (i, slot) in slots.iter().enumerate() {
            per_slot_ref[i] = slot.ref_count();
            if slot.ready {
                ready_count += 1;
            }
        }
        let current_entries = Self::current_index(&slots)
            .and_then(|i| slots[i].data.as_ref().map(|d| d.count))
            .unwrap_or(0);
        SnapshotStats {
            ready_count,
            per_slot_ref,
            current_entries,
        }
    }
}

fn real_clock() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::host::RawNames;
    use std::sync::atomic::AtomicI64;

    struct FakeSource {
        now: AtomicI64,
        names: Vec<String>,
    }

    impl MetricSource for FakeSource {
        fn get_names(&self) -> Result<RawNames, EngineError> {
            let t = self.now.load(Ordering::SeqCst);
            Ok(RawNames {
                names: self.names.clone(),
                times: vec![t; self.names.len()],
            })
        }
    }

    /// A clock under direct test control, shared with the cache via `Arc`.
    #[derive(Clone)]
    struct TestClock(Arc<AtomicI64>);

    impl TestClock {
        fn new() -> Self {
            Self(Arc::new(AtomicI64::new(0)))
        }

        fn set(&self, t: i64) {
            self.0.store(t, Ordering::SeqCst);
        }

        fn boxed(&self) -> Box<dyn Fn() -> i64 + Send + Sync> {
            let inner = Arc::clone(&self.0);
            Box::new(move || inner.load(Ordering::SeqCst))
        }
    }

    fn cache_with(names: Vec<&str>, expiration: u64) -> SnapshotCache {
        let source = Arc::new(FakeSource {
            now: AtomicI64::new(0),
            names: names.into_iter().map(String::from).collect(),
        });
        SnapshotCache::new(source, expiration)
    }

    fn cache_with_clock(names: Vec<&str>, expiration: u64, clock: &TestClock) -> SnapshotCache {
        let source = Arc::new(FakeSource {
            now: AtomicI64::new(0),
            names: names.into_iter().map(String::from).collect(),
        });
        SnapshotCache::with_clock(source, expiration, clock.boxed())
    }

    #[test]
    fn acquire_before_any_refresh_is_sentinel() {
        let cache = cache_with(vec!["a/cpu/idle"], 60);
        assert!(cache.acquire().is_none());
    }

    #[test]
    fn refresh_populates_a_slot_then_acquire_succeeds() {
        let cache = cache_with(vec!["a/cpu/idle", "b/cpu/idle"], 60);
        cache.refresh();
        let handle = cache.acquire().expect("snapshot should be ready");
        assert_eq!(handle.count(), 2);
        assert_eq!(handle.names(), &["a/cpu/idle".to_string(), "b/cpu/idle".to_string()]);
    }

    #[test]
    fn refresh_is_a_no_op_before_expiration() {
        let cache = cache_with(vec!["a/cpu/idle"], 60);
        cache.refresh();
        let stats_before = cache.stats();
        cache.refresh();
        let stats_after = cache.stats();
        assert_eq!(stats_before.ready_count, stats_after.ready_count);
        assert_eq!(stats_after.ready_count, 1);
    }

    #[test]
    fn refresh_before_expiration_is_idempotent() {
        let clock = TestClock::new();
        let cache = cache_with_clock(vec!["a/cpu/idle"], 60, &clock);
        clock.set(1000);
        cache.refresh();
        assert_eq!(cache.stats().ready_count, 1);

        clock.set(1010); // +10s, well under the 60s expiration
        cache.refresh();
        let stats = cache.stats();
        assert_eq!(stats.ready_count, 1, "no new slot should be populated");
        assert_eq!(stats.per_slot_ref.iter().sum::<usize>(), 0);
    }

    #[test]
    fn reclaims_stale_slot_once_unreferenced_and_expired() {
        let clock = TestClock::new();
        let cache = cache_with_clock(vec!["a/cpu/idle"], 10, &clock);
        clock.set(1000);
        cache.refresh(); // slot 0 becomes current

        clock.set(1011); // past the 10s expiration, slot 0 has no readers
        cache.refresh(); // slot 1 populated and promoted to current; slot 0 still ready
        assert_eq!(cache.stats().ready_count, 2);

        clock.set(1012); // any later refresh's reclaim pass drops the now-stale, non-current slot 0
        cache.refresh();
        let stats = cache.stats();
        assert_eq!(
            stats.ready_count, 1,
            "the stale, unreferenced slot is reclaimed once it is no longer current"
        );
        assert_eq!(stats.current_entries, 1);
    }

    #[test]
    fn current_snapshot_survives_refresh_while_a_reader_holds_it() {
        let clock = TestClock::new();
        let cache = cache_with_clock(vec!["a/cpu/idle"], 10, &clock);
        clock.set(1000);
        cache.refresh();
        let held = cache.acquire().unwrap();

        clock.set(2000); // force a refresh well past expiration
        cache.refresh();

        // the old snapshot is still intact for as long as `held` is alive.
        assert_eq!(held.count(), 1);
        assert_eq!(held.names(), &["a/cpu/idle".to_string()]);
        drop(held);
    }

    #[test]
    fn acquire_holds_the_slot_ready_until_dropped() {
        let cache = cache_with(vec!["a/cpu/idle"], 60);
        cache.refresh();
        let handle = cache.acquire().unwrap();
        let stats = cache.stats();
        assert_eq!(stats.per_slot_ref.iter().sum::<usize>(), 1);
        drop(handle);
        let stats = cache.stats();
        assert_eq!(stats.per_slot_ref.iter().sum::<usize>(), 0);
    }

    #[test]
    fn ref_never_goes_negative_across_many_acquire_release_cycles() {
        let cache = cache_with(vec!["a/cpu/idle"], 60);
        cache.refresh();
        for _ in 0..50 {
            let h = cache.acquire().unwrap();
            drop(h);
        }
        let stats = cache.stats();
        assert!(stats.per_slot_ref.iter().all(|&r| r == 0));
    }

    #[test]
    fn table_exhaustion_is_logged_not_fatal() {
        // Fill every slot with a live reader so none can ever be reclaimed,
        // then force one more refresh. The cache must log and return, not panic.
        let clock = TestClock::new();
        let cache = cache_with_clock(vec!["a/cpu/idle"], 0, &clock);
        let mut handles = Vec::new();
        for i in 0..SNAPSHOT_SLOTS {
            clock.set(1000 + i as i64); // strictly increasing so each new slot becomes current
            cache.refresh();
            handles.push(cache.acquire().unwrap());
        }
        assert_eq!(cache.stats().ready_count, SNAPSHOT_SLOTS);

        clock.set(9999);
        cache.refresh(); // no free slot: must log and return, never panic
        assert_eq!(handles.len(), SNAPSHOT_SLOTS);
        assert_eq!(cache.stats().ready_count, SNAPSHOT_SLOTS);
    }
}
