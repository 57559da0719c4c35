//! JSON-RPC 2.0 request parsing and response envelope construction.
//!
//! Requests and responses are modeled as `serde_json::Value` trees rather
//! than a single rigid `#[derive(Deserialize)]` struct. A node can fail so
//! badly it gets no envelope at all (wrong `jsonrpc` field, missing or
//! non-integer `id`), or it can fail with a structured JSON-RPC error
//! (missing `method`, unknown method, bad params). A blanket `serde` derive
//! would collapse both into one parse error and lose that distinction.

use serde_json::{json, Value};

use crate::engine::EngineState;
use crate::error::{
    CODE_INTERNAL_ERROR, CODE_INVALID_REQUEST, CODE_METHOD_NOT_FOUND, HANDLER_OK,
    MSG_INTERNAL_ERROR, MSG_INVALID_REQUEST, MSG_METHOD_NOT_FOUND,
};
use crate::registry::Registry;

/// Result of parsing and dispatching a single request node.
pub enum NodeOutcome {
    /// A well-formed JSON-RPC envelope (success or structured error).
    Envelope(Value),
    /// The node was too malformed to even carry an `id`. The whole node
    /// fails with no envelope; the front-end surfaces a generic 400.
    Reject,
}

fn build_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() },
    })
}

/// Parse and dispatch a single JSON-RPC request node.
pub fn parse_one(node: &Value, registry: &Registry, state: &EngineState) -> NodeOutcome {
    let obj = match node.as_object() {
        Some(o) => o,
        None => return NodeOutcome::Reject,
    };

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some("2.0") => {}
        _ => return NodeOutcome::Reject,
    }

    let id = match obj.get("id") {
        Some(v) if v.is_i64() || v.is_u64() => v.clone(),
        _ => return NodeOutcome::Reject,
    };

    let method = match obj.get("method").and_then(Value::as_str) {
        Some(m) => m,
        None => {
            return NodeOutcome::Envelope(build_error(
                id,
                CODE_INVALID_REQUEST,
                MSG_INVALID_REQUEST,
            ))
        }
    };

    let handler = match registry.lookup(method) {
        Some(h) => h,
        None => {
            return NodeOutcome::Envelope(build_error(
                id,
                CODE_METHOD_NOT_FOUND,
                MSG_METHOD_NOT_FOUND,
            ))
        }
    };

    let params = obj.get("params").cloned().unwrap_or(Value::Null);

    let mut result = Value::Null;
    match handler(state, &params, &mut result) {
        HANDLER_OK => NodeOutcome::Envelope(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        })),
        code if code > 0 => {
            NodeOutcome::Envelope(build_error(id, CODE_INTERNAL_ERROR, MSG_INTERNAL_ERROR))
        }
        code => {
            let message = canonical_message_for(code);
            NodeOutcome::Envelope(build_error(id, code, message))
        }
    }
}

fn canonical_message_for(code: i64) -> &'static str {
    match code {
        CODE_INVALID_REQUEST => MSG_INVALID_REQUEST,
        CODE_METHOD_NOT_FOUND => MSG_METHOD_NOT_FOUND,
        crate::error::CODE_INVALID_PARAMS => "Invalid params.",
        _ => MSG_INTERNAL_ERROR,
    }
}

/// Parse a full request body: a single object or a batch (array) of objects.
///
/// Returns the serialized response text, or `Err(())` on a structural
/// failure (not a JSON object/array, or an array element that isn't an
/// object); the front-end maps that to a generic HTTP 400 page. On any
/// mid-batch structural failure the partial answer buffer is discarded,
/// never emitted.
pub fn parse_request(raw: &str, registry: &Registry, state: &EngineState) -> Result<String, ()> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ())?;

    if let Some(items) = value.as_array() {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match parse_one(item, registry, state) {
                NodeOutcome::Envelope(v) => out.push(v),
                NodeOutcome::Reject => return Err(()),
            }
        }
        Ok(Value::Array(out).to_string())
    } else if value.is_object() {
        match parse_one(&value, registry, state) {
            NodeOutcome::Envelope(v) => Ok(v.to_string()),
            NodeOutcome::Reject => Err(()),
        }
    } else {
        Err(())
    }
}
