// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Errors raised while interpreting wire payloads.

use thiserror::Error;

use crate::message::MessageKind;

/// Failure to turn received bytes into a typed value.
///
/// Decode failures are always recoverable: a session drops the offending
/// frame and keeps reading. None of these variants should tear anything down.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame was not valid JSON, or a payload did not match its shape.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An integer code outside the closed set it belongs to.
    #[error("unknown {what} code {code}")]
    UnknownCode { what: &'static str, code: u8 },

    /// A recognized message kind arrived without its body.
    #[error("{kind:?} message has no body")]
    MissingBody { kind: MessageKind },

    /// A recognized message kind arrived without a required sibling field.
    #[error("{kind:?} message is missing field `{name}`")]
    MissingField { kind: MessageKind, name: &'static str },

    /// The server answered with `success: false`.
    #[error("server rejected the request: {text} (code {code})")]
    Rejected { text: String, code: String },

    /// The server answered successfully but sent no data payload.
    #[error("response carried no data")]
    EmptyResponse,
}
