//! Error types for the language server channel.

use thiserror::Error;

/// Result alias for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the transport, supervisor, or session.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure on the process streams or at spawn time.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be serialized or deserialized.
    #[error("invalid JSON-RPC payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The wire framing was malformed.
    #[error("malformed message framing: {0}")]
    Framing(String),

    /// The channel closed before the operation completed.
    #[error("language server channel closed")]
    ChannelClosed,

    /// The session handshake did not complete.
    #[error("handshake with language server failed: {0}")]
    Handshake(String),

    /// The server answered a request with an error response.
    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },
}
