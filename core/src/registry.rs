//! The static method registry.
//!
//! Dispatch is a linear scan over a small, fixed table, the idiomatic
//! equivalent of the reference `dispatch_action` match statement, but
//! exposed as data so the table's size can be reported as a self-metric and
//! tests can assert every required method is registered exactly once.

use serde_json::Value;

use crate::engine::EngineState;

/// A handler: given the shared engine state, `params`, and a mutable
/// result slot, returns `0` on success (the slot has been populated with
/// the method's result value, object or array depending on the method), a
/// negative canonical JSON-RPC code on caller error, or any positive value
/// for an opaque internal failure. Mirrors the source's `handler(params,
/// result, err) -> int` contract; `state` is threaded through as a plain
/// parameter rather than captured, so the table stays a table of bare
/// function pointers, not closures.
pub type HandlerFn = fn(&EngineState, &Value, &mut Value) -> i64;

pub struct Registry {
    methods: &'static [(&'static str, HandlerFn)],
}

impl Registry {
    pub const fn new(methods: &'static [(&'static str, HandlerFn)]) -> Self {
        Self { methods }
    }

    /// Exact-match, linear lookup; the table is only a handful of entries.
    pub fn lookup(&self, name: &str) -> Option<HandlerFn> {
        self.methods
            .iter()
            .find(|(method_name, _)| *method_name == name)
            .map(|(_, handler)| *handler)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.iter().map(|(name, _)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_state: &EngineState, _params: &Value, _result: &mut Value) -> i64 {
        0
    }

    #[test]
    fn lookup_finds_registered_method() {
        let registry = Registry::new(&[("pw_get_status", noop as HandlerFn)]);
        assert!(registry.lookup("pw_get_status").is_some());
    }

    #[test]
    fn lookup_misses_unregistered_method() {
        let registry = Registry::new(&[("pw_get_status", noop as HandlerFn)]);
        assert!(registry.lookup("pw_delete_everything").is_none());
    }

    #[test]
    fn method_count_matches_table_size() {
        let registry = Registry::new(&[
            ("a", noop as HandlerFn),
            ("b", noop as HandlerFn),
            ("c", noop as HandlerFn),
        ]);
        assert_eq!(registry.method_count(), 3);
    }
}
