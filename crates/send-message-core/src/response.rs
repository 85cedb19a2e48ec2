// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Method-channel response envelope.
//
// The framework side distinguishes three reply shapes: a success value, an
// error (code + message + optional details), and "not implemented". A
// resolved result handle is converted into one of these before it crosses
// the channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SmsError;

/// What the framework receives for a single method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelResponse {
    Success {
        value: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    NotImplemented,
}

impl ChannelResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error code, if this is an error reply.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<&SmsError> for ChannelResponse {
    fn from(err: &SmsError) -> Self {
        match err {
            SmsError::NotImplemented(_) => Self::NotImplemented,
            other => Self::Error {
                code: other.code().to_string(),
                message: other.to_string(),
                details: None,
            },
        }
    }
}

impl From<Result<Value, SmsError>> for ChannelResponse {
    fn from(result: Result<Value, SmsError>) -> Self {
        match result {
            Ok(value) => Self::Success { value },
            Err(err) => Self::from(&err),
        }
    }
}
