//! Error types shared across the qqbot crates.

use thiserror::Error;

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors raised while decoding an inbound frame.
///
/// A decode error aborts processing of that one frame only.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON or does not match the expected shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is not valid UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The payload is valid JSON but not an object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// The object is neither an update nor an API response.
    #[error("frame has neither `post_type` nor `echo`")]
    Unrecognized,
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by the outbound frame sink.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The frame could not be written.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// The connection is gone.
    #[error("transport closed")]
    Closed,
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors raised while performing a request/response call.
///
/// A response whose `status` is not `"ok"` is **not** an error here; it is
/// handed back to the caller unchanged.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The connection went away before a response arrived.
    #[error("bot is not connected")]
    NotConnected,

    /// No response arrived within the configured timeout.
    #[error("API call timed out")]
    Timeout,

    /// The request frame could not be sent.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Another call is already waiting on the same echo token.
    #[error("echo {0} is already pending")]
    DuplicateEcho(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
