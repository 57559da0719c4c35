//! The HTTP front-end (C4): an `axum` router accepting `POST /`, plus the
//! ambient `/metrics` and `/health` observability routes.
//!
//! A single shared `State`, a `/metrics` route that encodes the engine's own
//! `prometheus::Registry`, and a `/` route that decodes the body and hands
//! it to the codec. Because this endpoint must also accept
//! `application/x-www-form-urlencoded` bodies (not just `application/json`),
//! it takes the raw `Bytes` and decodes them itself rather than using a
//! `Json<Value>` extractor.
//!
//! Axum already buffers the full request body before invoking a handler, so
//! the source's manual "append bytes across repeated callbacks" step has no
//! counterpart here — the *observable* contract (empty body → 400, decode
//! failure → 400, parsed text handed to the codec) is preserved exactly.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use tracing::warn;

use crate::codec;
use crate::engine::{EngineState, METHODS};
use crate::error::{
    CODE_TOO_MANY_CONNECTIONS, MSG_TOO_MANY_CONNECTIONS,
};

const MIME_JSON_RPC: &str = "application/json-rpc";
const BAD_REQUEST_PAGE: &str = "<html><body><h1>400 Bad Request</h1></body></html>";

/// Build the router. `state` is shared by every connection; it owns the
/// snapshot cache, the counters, and the metrics registry.
pub fn router(state: Arc<EngineState>) -> Router {
    Router::new()
        .route("/", post(handle_post).get(reject_get))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn metrics_handler(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Any verb other than `POST` on `/` is a structural failure.
async fn reject_get(State(state): State<Arc<EngineState>>) -> Response {
    state.counters.record_failure();
    bad_request_response()
}

fn bad_request_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, "text/html"), (header::CONNECTION, "close")],
        BAD_REQUEST_PAGE,
    )
        .into_response()
}

fn too_many_connections_response() -> Response {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "error": { "code": CODE_TOO_MANY_CONNECTIONS, "message": MSG_TOO_MANY_CONNECTIONS },
        "id": serde_json::Value::Null,
    })
    .to_string();
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [
            (header::CONTENT_TYPE, MIME_JSON_RPC),
            (header::CONNECTION, "close"),
        ],
        body,
    )
        .into_response()
}

fn is_form_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Percent-decode a form body in place: `+` → space, `%HH` → byte.
/// Returns `None` on a malformed escape sequence.
fn percent_decode(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = body.get(i + 1..i + 3)?;
                let byte = u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?;
                out.push(byte);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

/// Connection lifecycle for one POST (C5). Admission happens here, at the
/// first (and, with Axum's buffered body, only) callback for the
/// connection; the counter decrement on completion is automatic via
/// `Drop` once this guard falls out of scope, the idiomatic stand-in for
/// the source's manual "completion hook".
struct AdmissionGuard<'a> {
    state: &'a EngineState,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.state.counters.release_client();
    }
}

async fn handle_post(
    State(state): State<Arc<EngineState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.counters.try_admit(state.max_clients) {
        state.counters.record_failure();
        return too_many_connections_response();
    }
    let _admission = AdmissionGuard { state: &state };

    if body.is_empty() {
        state.counters.record_failure();
        return bad_request_response();
    }

    let decoded: Vec<u8> = if is_form_urlencoded(&headers) {
        match percent_decode(&body) {
            Some(d) => d,
            None => {
                state.counters.record_failure();
                return bad_request_response();
            }
        }
    } else {
        body.to_vec()
    };

    let text = match std::str::from_utf8(&decoded) {
        Ok(t) => t,
        Err(_) => {
            state.counters.record_failure();
            return bad_request_response();
        }
    };

    match codec::parse_request(text, &METHODS, &state) {
        Ok(answer) => {
            state.counters.record_success();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, MIME_JSON_RPC)],
                answer,
            )
                .into_response()
        }
        Err(()) => {
            warn!("structural failure parsing JSON-RPC request body");
            state.counters.record_failure();
            bad_request_response()
        }
    }
}
