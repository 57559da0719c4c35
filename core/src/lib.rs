//! `pw-core`: the concurrent JSON-RPC query engine sitting between an HTTP
//! listener and a host metrics-collection process's in-memory value cache
//! and on-disk round-robin data hierarchy.
//!
//! # Components
//!
//! - [`snapshot`] (C1) — the ref-counted, periodically-refreshed cache of
//!   the metric name index.
//! - [`codec`] (C2) — JSON-RPC 2.0 request parsing and envelope construction.
//! - [`registry`] (C3) — the static method table.
//! - [`http`] (C4) — the `axum` front-end: admission control, body decoding,
//!   and the `/metrics`/`/health` observability routes.
//! - [`counters`] (C5, part) — the four independent process-wide counters.
//! - [`handlers`] (C6) — the five read-only query methods.
//! - [`tick`] (C7) — the periodic task driving refresh and metrics publication.
//! - [`config`] (C8) — TOML-backed configuration.
//! - [`error`] (C9) — the crate error enum and canonical JSON-RPC codes.
//! - [`metrics`] (C10) — the `prometheus::Registry` of self-metrics.
//! - [`host`] (C11, trait contract) — the `MetricSource`/`DirLister` seams
//!   the embedding host implements.

pub mod codec;
pub mod config;
pub mod counters;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod host;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod snapshot;
pub mod tick;

pub use config::Config;
pub use engine::{EngineState, METHODS};
pub use error::EngineError;
pub use host::{DirLister, FsDirLister, MetricSource, RawNames};
