// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the view client.
//!
//! Every failure in this crate falls into one of four categories, and none of
//! them is fatal: the worst outcome of any error is a stale or missing status
//! display. Sessions and controllers stay usable after reporting an error.

use thiserror::Error;
use upview_api::DecodeError;

/// Main error type for view client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket-level failure: handshake refused, connection reset, write to a
    /// dead peer. Surfaced as a session error; reconnection is the caller's
    /// policy, never this crate's.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An inbound or outbound payload could not be (de)serialized.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The peer behaved in a way the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An operation invalid in the current state, e.g. sending on a session
    /// that is not open. Reported to the caller, never panicked.
    #[error("invalid operation: {0}")]
    Misuse(String),
}

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(DecodeError::Malformed(err))
    }
}

impl From<String> for ClientError {
    fn from(s: String) -> Self {
        Self::Protocol(s)
    }
}

impl From<&str> for ClientError {
    fn from(s: &str) -> Self {
        Self::Protocol(s.to_string())
    }
}
