//! # qqbot core
//!
//! Shared building blocks for the qqbot client library:
//!
//! - **Content abstractions**: [`ContentSegment`] and [`FormattedContent`], the
//!   traits a rich message body implements so that plain-text flattening and
//!   display rendering work the same way for every segment type.
//! - **Error types**: [`DecodeError`] for inbound payloads, [`TransportError`]
//!   for the outbound frame sink and [`ApiError`] for request/response calls.
//!
//! Remote failures (`status != "ok"`) are not errors at this layer; they are
//! returned to the caller as ordinary response data.

pub mod content;
pub mod error;

pub use content::{ContentSegment, FormattedContent};
pub use error::{ApiError, ApiResult, DecodeError, DecodeResult, TransportError, TransportResult};
