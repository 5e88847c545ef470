//! Error types for the VK API client.
//!
//! # Design
//! Transport failures keep their own enum so callers can tell a refused
//! connection from a timeout from a non-2xx status without string matching.
//! `Remote` wraps the server's `{"error": {...}}` envelope, which arrives over
//! a perfectly healthy HTTP exchange and is therefore not a transport error.

use std::ops::Range;

use thiserror::Error;

use crate::types::RemoteError;

/// Errors returned by `VkClient` and its builders.
#[derive(Debug, Error)]
pub enum Error {
    /// Required client identity is missing or unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The method name cannot be turned into a remote method path.
    #[error("invalid method name: {0:?}")]
    InvalidMethod(String),

    /// Call arguments could not be turned into wire fields.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The HTTP round-trip failed or returned a non-2xx status.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The body held no complete document, or a document is not valid JSON.
    ///
    /// `range` locates an invalid document within the decoded body; it is
    /// `None` when no complete document was found at all.
    #[error("malformed response: {reason} (fragment: {fragment:?})")]
    MalformedResponse {
        reason: String,
        fragment: String,
        range: Option<Range<usize>>,
    },

    /// The server answered with an error envelope.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Failures reported by a `Transport` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established or broke mid-request.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// The server returned a status outside 200..=299.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}
