//! Crate-level error types.
//!
//! [`AgentError`] unifies every error source (configuration, WebSocket,
//! decoding, strategy) behind a single enum so callers can match on the
//! variant they care about while still using the `?` operator.

use std::time::Duration;

use crate::models::DecodeError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// An environment variable held a value that could not be used.
    #[error("configuration error: {0}")]
    Config(String),

    /// A custom trust root could not be loaded.
    #[error("tls error: {0}")]
    Tls(String),

    /// A WebSocket operation (connect, receive, close) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame did not match the expected stream schema.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The WebSocket handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The peer closed the connection or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,

    /// Every dial attempt in the retry budget failed.
    #[error("failed to establish a connection to {url}")]
    ConnectionFailed { url: String },

    /// A strategy rejected an operation such as placing an order.
    #[error("strategy error: {0}")]
    Strategy(String),
}
