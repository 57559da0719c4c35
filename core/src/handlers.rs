//! The five read-only query handlers.
//!
//! Each handler reads a borrowed [`crate::snapshot::SnapshotHandle`] from
//! the snapshot cache or lists a directory through [`crate::host::DirLister`];
//! none of them mutate anything. Signatures match [`crate::registry::HandlerFn`]
//! exactly so they can sit in the static method table unmodified.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use crate::engine::EngineState;
use crate::error::{CODE_INVALID_PARAMS, HANDLER_OK};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// `host/plugin[-instance]/type[-instance]` → `(host, metric_identifier)`.
/// Names with no `/` have no host prefix and are skipped by callers rather
/// than treated as a bug.
fn split_host(name: &str) -> Option<(&str, &str)> {
    name.split_once('/')
}

fn is_valid_path_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains('/')
}

/// `pw_get_status`, params `{timeout: int, server: [string]}`.
pub fn pw_get_status(state: &EngineState, params: &Value, result: &mut Value) -> i64 {
    let timeout = match params.get("timeout").and_then(Value::as_i64) {
        Some(t) if t >= 0 => t,
        _ => return CODE_INVALID_PARAMS,
    };
    let servers = match params.get("server").and_then(Value::as_array) {
        Some(arr) => {
            let mut names = Vec::with_capacity(arr.len());
            for v in arr {
                match v.as_str() {
                    Some(s) => names.push(s.to_string()),
                    None => return CODE_INVALID_PARAMS,
                }
            }
            names
        }
        None => return CODE_INVALID_PARAMS,
    };

    let handle = match state.snapshot.acquire() {
        Some(h) => h,
        None => return 1,
    };

    let mut latest: BTreeMap<String, i64> = servers.into_iter().map(|s| (s, 0)).collect();
    for (name, &time) in handle.names().iter().zip(handle.times()) {
        if let Some((host, _rest)) = split_host(name) {
            if let Some(slot) = latest.get_mut(host) {
                if time > *slot {
                    *slot = time;
                }
            }
        }
    }
    drop(handle);

    let now = unix_now();
    let mut out = serde_json::Map::new();
    for (server, last_seen) in latest {
        let state_str = if last_seen == 0 {
            "unknown"
        } else if last_seen >= now - timeout {
            "up"
        } else {
            "down"
        };
        out.insert(server, Value::String(state_str.to_string()));
    }
    *result = Value::Object(out);
    HANDLER_OK
}

/// `pw_get_metric`, params `[string]` (requested servers).
pub fn pw_get_metric(state: &EngineState, params: &Value, result: &mut Value) -> i64 {
    let servers: HashSet<&str> = match params.as_array() {
        Some(arr) => {
            let mut set = HashSet::with_capacity(arr.len());
            for v in arr {
                match v.as_str() {
                    Some(s) => {
                        set.insert(s);
                    }
                    None => return CODE_INVALID_PARAMS,
                }
            }
            set
        }
        None => return CODE_INVALID_PARAMS,
    };

    let handle = match state.snapshot.acquire() {
        Some(h) => h,
        None => return 1,
    };

    let mut identifiers: BTreeSet<String> = BTreeSet::new();
    for name in handle.names() {
        if let Some((host, rest)) = split_host(name) {
            if servers.contains(host) {
                identifiers.insert(rest.to_string());
            }
        }
    }
    drop(handle);

    *result = Value::Array(identifiers.into_iter().map(Value::String).collect());
    HANDLER_OK
}

fn list_dir_result(state: &EngineState, path: std::path::PathBuf, result: &mut Value) -> i64 {
    match state.dir_lister.list(&path) {
        Ok(values) => {
            *result = json!({ "values": values, "nb": values.len() });
            HANDLER_OK
        }
        Err(_) => 1,
    }
}

/// `pw_get_dir_hosts`, no useful params.
pub fn pw_get_dir_hosts(state: &EngineState, _params: &Value, result: &mut Value) -> i64 {
    list_dir_result(state, state.data_dir.clone(), result)
}

/// `pw_get_dir_plugins`, params `{hostname: string}`.
pub fn pw_get_dir_plugins(state: &EngineState, params: &Value, result: &mut Value) -> i64 {
    let hostname = match params.get("hostname").and_then(Value::as_str) {
        Some(h) if is_valid_path_component(h) => h,
        _ => return CODE_INVALID_PARAMS,
    };
    list_dir_result(state, state.resolve_dir(&[hostname]), result)
}

/// `pw_get_dir_types`, params `{hostname: string, plugin: string}`.
pub fn pw_get_dir_types(state: &EngineState, params: &Value, result: &mut Value) -> i64 {
    let hostname = match params.get("hostname").and_then(Value::as_str) {
        Some(h) if is_valid_path_component(h) => h,
        _ => return CODE_INVALID_PARAMS,
    };
    let plugin = match params.get("plugin").and_then(Value::as_str) {
        Some(p) if is_valid_path_component(p) => p,
        _ => return CODE_INVALID_PARAMS,
    };
    list_dir_result(state, state.resolve_dir(&[hostname, plugin]), result)
}
