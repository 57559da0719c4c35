//! The four process-wide, independently-locked counters.
//!
//! Plain atomics rather than a shared mutex, since the four counters are
//! mutually independent and a per-counter lock would only add contention
//! with no safety benefit.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Process-wide request and connection counters.
#[derive(Default)]
pub struct Counters {
    active_clients: AtomicI64,
    new_connections: AtomicU64,
    rpc_success: AtomicU64,
    rpc_failure: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new connection: `true` if under `max_clients`, `false` if the
    /// cap was already reached (the caller must reject with HTTP 503).
    pub fn try_admit(&self, max_clients: u16) -> bool {
        loop {
            let current = self.active_clients.load(Ordering::Acquire);
            if current >= max_clients as i64 {
                return false;
            }
            if self
                .active_clients
                .compare_exchange_weak(
                    current,
                    current + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.new_connections.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
    }

    /// Release a previously-admitted connection. Must never drive the
    /// counter negative.
    pub fn release_client(&self) {
        let prev = self.active_clients.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "active_clients must never go negative");
    }

    pub fn record_success(&self) {
        self.rpc_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.rpc_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_clients(&self) -> i64 {
        self.active_clients.load(Ordering::Acquire)
    }

    pub fn new_connections(&self) -> u64 {
        self.new_connections.load(Ordering::Relaxed)
    }

    pub fn rpc_success(&self) -> u64 {
        self.rpc_success.load(Ordering::Relaxed)
    }

    pub fn rpc_failure(&self) -> u64 {
        self.rpc_failure.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_cap_then_rejects() {
        let counters = Counters::new();
        assert!(counters.try_admit(2));
        assert!(counters.try_admit(2));
        assert!(!counters.try_admit(2), "third admission must be rejected");
        assert_eq!(counters.active_clients(), 2);
        assert_eq!(counters.new_connections(), 2);
    }

    #[test]
    fn release_frees_capacity_for_a_new_admission() {
        let counters = Counters::new();
        assert!(counters.try_admit(1));
        assert!(!counters.try_admit(1));
        counters.release_client();
        assert!(counters.try_admit(1));
    }

    #[test]
    fn success_and_failure_counters_are_independent() {
        let counters = Counters::new();
        counters.record_success();
        counters.record_success();
        counters.record_failure();
        assert_eq!(counters.rpc_success(), 2);
        assert_eq!(counters.rpc_failure(), 1);
    }
}
