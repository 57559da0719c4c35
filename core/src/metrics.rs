//! Prometheus metrics published by the periodic tick.
//!
//! A dedicated [`Registry`] (not
//! the global default registry, so more than one engine can coexist in a
//! process) owning gauges/counters that the `/metrics` HTTP route encodes in
//! the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_vec_with_registry,
    register_int_gauge_with_registry, IntCounter, IntGauge, IntGaugeVec, Opts, Registry,
};

use crate::snapshot::SNAPSHOT_SLOTS;

/// Self-metrics published on every tick.
pub struct EngineMetrics {
    pub registry: Registry,

    pub active_clients: IntGauge,
    pub connections_total: IntCounter,
    pub rpc_success_total: IntCounter,
    pub rpc_failure_total: IntCounter,
    pub snapshot_ready_slots: IntGauge,
    pub snapshot_slot_ref: IntGaugeVec,
    pub snapshot_current_entries: IntGauge,
}

impl EngineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let active_clients = register_int_gauge_with_registry!(
            Opts::new("pw_active_clients", "Currently admitted HTTP clients"),
            registry
        )
        .expect("failed to register pw_active_clients gauge");

        let connections_total = register_int_counter_with_registry!(
            Opts::new(
                "pw_connections_total",
                "Lifetime count of admitted connections"
            ),
            registry
        )
        .expect("failed to register pw_connections_total counter");

        let rpc_success_total = register_int_counter_with_registry!(
            Opts::new("pw_rpc_success_total", "Lifetime count of succeeded RPCs"),
            registry
        )
        .expect("failed to register pw_rpc_success_total counter");

        let rpc_failure_total = register_int_counter_with_registry!(
            Opts::new("pw_rpc_failure_total", "Lifetime count of failed RPCs"),
            registry
        )
        .expect("failed to register pw_rpc_failure_total counter");

        let snapshot_ready_slots = register_int_gauge_with_registry!(
            Opts::new(
                "pw_snapshot_ready_slots",
                "Number of snapshot table slots currently ready"
            ),
            registry
        )
        .expect("failed to register pw_snapshot_ready_slots gauge");

        let snapshot_slot_ref = register_int_gauge_vec_with_registry!(
            Opts::new("pw_snapshot_slot_ref", "Outstanding readers per snapshot slot"),
            &["slot"],
            registry
        )
        .expect("failed to register pw_snapshot_slot_ref gauge vec");

        let snapshot_current_entries = register_int_gauge_with_registry!(
            Opts::new(
                "pw_snapshot_current_entries",
                "Entry count of the current snapshot"
            ),
            registry
        )
        .expect("failed to register pw_snapshot_current_entries gauge");

        Self {
            registry,
            active_clients,
            connections_total,
            rpc_success_total,
            rpc_failure_total,
            snapshot_ready_slots,
            snapshot_slot_ref,
            snapshot_current_entries,
        }
    }

    /// Publish one tick's worth of self-metrics.
    pub fn publish(
        &self,
        active_clients: i64,
        connections_total: u64,
        rpc_success_total: u64,
        rpc_failure_total: u64,
        ready_slots: usize,
        per_slot_ref: &[usize; SNAPSHOT_SLOTS],
        current_entries: usize,
    ) {
        self.active_clients.set(active_clients);
        set_counter_to(&self.connections_total, connections_total);
        set_counter_to(&self.rpc_success_total, rpc_success_total);
        set_counter_to(&self.rpc_failure_total, rpc_failure_total);
        self.snapshot_ready_slots.set(ready_slots as i64);
        for (i, &r) in per_slot_ref.iter().enumerate() {
            self.snapshot_slot_ref
                .with_label_values(&[&i.to_string()])
                .set(r as i64);
        }
        self.snapshot_current_entries.set(current_entries as i64);
    }
}

/// `IntCounter` only exposes `inc`/`inc_by`; since our source of truth is an
/// external monotonic `AtomicU64` (see [`crate::counters::Counters`]), each
/// tick reconciles the Prometheus counter up to that value instead of
/// double-counting.
fn set_counter_to(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
