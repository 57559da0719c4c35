//! Engine error types and the canonical JSON-RPC 2.0 error vocabulary.

use thiserror::Error;

/// Canonical JSON-RPC 2.0 error code: the request envelope was malformed.
pub const CODE_INVALID_REQUEST: i64 = -32600;
/// Canonical JSON-RPC 2.0 error code: no handler is registered for `method`.
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// Canonical JSON-RPC 2.0 error code: a handler rejected its `params`.
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// Canonical JSON-RPC 2.0 error code: a handler failed for reasons opaque to the caller.
pub const CODE_INTERNAL_ERROR: i64 = -32603;
/// Extension code (outside the JSON-RPC reserved range used by this crate):
/// the server is at `MaxClients` and refused the connection.
pub const CODE_TOO_MANY_CONNECTIONS: i64 = -32400;

pub const MSG_INVALID_REQUEST: &str = "Invalid Request.";
pub const MSG_METHOD_NOT_FOUND: &str = "Method not found.";
pub const MSG_INTERNAL_ERROR: &str = "Internal error.";
pub const MSG_TOO_MANY_CONNECTIONS: &str = "Too many connections";

/// Errors surfaced by the engine's own components.
///
/// This is the Rust-internal error vocabulary; it is distinct from the
/// JSON-RPC integer codes above, which are assigned at the codec boundary
/// (see [`crate::codec`]).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("no snapshot is ready yet")]
    SnapshotUnavailable,

    #[error("snapshot table exhausted: no free slot for refresh")]
    SnapshotTableExhausted,

    #[error("metric source error: {0}")]
    MetricSource(String),

    #[error("directory read error for {path}: {source}")]
    DirRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid hostname or plugin: {0}")]
    InvalidPathComponent(String),

    #[error("malformed JSON-RPC request: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A handler's outcome, mirroring the source contract:
/// `0` on success, a negative canonical JSON-RPC code on caller error,
/// any positive value to signal an opaque internal failure.
pub type HandlerCode = i64;

pub const HANDLER_OK: HandlerCode = 0;

impl EngineError {
    /// Map an engine error to the JSON-RPC code a handler should return.
    pub fn as_handler_code(&self) -> HandlerCode {
        match self {
            EngineError::InvalidPathComponent(_) => CODE_INVALID_PARAMS,
            EngineError::Config(_) => CODE_INVALID_PARAMS,
            EngineError::SnapshotUnavailable
            | EngineError::SnapshotTableExhausted
            | EngineError::MetricSource(_)
            | EngineError::DirRead { .. }
            | EngineError::Codec(_) => 1,
        }
    }
}
