// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Standard response envelope of the view REST API.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::message::Envelope;

/// What every view endpoint answers with.
///
/// `data` carries the endpoint-specific payload. Some endpoints additionally
/// attach protocol messages for the caller to process; `text` and `code`
/// describe failures when `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Envelope>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwraps the payload of a successful response.
    ///
    /// # Errors
    /// Returns [`DecodeError::Rejected`] when the server reported failure and
    /// [`DecodeError::EmptyResponse`] when success came without data.
    pub fn into_data(self) -> Result<T, DecodeError> {
        if !self.success {
            return Err(DecodeError::Rejected {
                text: self.text.unwrap_or_else(|| "unspecified failure".to_string()),
                code: self.code.unwrap_or_else(|| "unknown".to_string()),
            });
        }
        self.data.ok_or(DecodeError::EmptyResponse)
    }
}
