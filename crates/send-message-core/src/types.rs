// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the SMS bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, SmsError};

/// Value a successful send resolves with.
pub const SEND_CONFIRMATION: &str = "SMS Sent!";

/// Method names understood on the channel.
pub mod methods {
    pub const SEND_SMS: &str = "sendSMS";
    pub const CAN_SEND_SMS: &str = "canSendSMS";
}

/// Android `Activity.RESULT_OK`.
pub const RESULT_OK: i32 = -1;

/// Intent extra carrying the [`OperationId`] on a sent-broadcast.
pub const OP_ID_EXTRA: &str = "send_message.op_id";

/// Unique identifier for a pending send, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the textual form carried in [`OP_ID_EXTRA`].
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text.trim()).ok().map(Self)
    }

    /// Stable per-operation request code for the sent `PendingIntent`, so
    /// intents of different sends are never merged by the platform.
    pub fn request_code(&self) -> i32 {
        self.0.as_u128() as i32
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which asynchronous event a pending send is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingStage {
    /// The permission prompt is showing.
    AwaitingPermission,
    /// The platform send was dispatched; waiting for the sent broadcast.
    AwaitingDelivery,
}

/// Result of the platform's sent-broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Success,
    Failure,
}

impl DeliveryOutcome {
    /// Map a broadcast result code. Only `RESULT_OK` counts as success.
    pub fn from_result_code(code: i32) -> Self {
        if code == RESULT_OK {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// One entry of a permission-request result array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    /// Map Android's `PackageManager.PERMISSION_GRANTED` (0) / `PERMISSION_DENIED` (-1).
    pub fn from_grant_result(code: i32) -> Self {
        if code == 0 { Self::Granted } else { Self::Denied }
    }
}

/// A single call arriving on the method channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Arguments of `sendSMS`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendRequest {
    pub message: String,
    /// Raw recipient list; see [`split_recipients`].
    pub recipients: String,
    /// Send through the platform SMS service instead of the compose dialog.
    pub send_direct: bool,
}

impl SendRequest {
    /// Parse channel arguments. Missing or `null` fields take their defaults.
    pub fn from_arguments(args: &Value) -> Result<Self> {
        let map = match args {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(SmsError::InvalidArguments(format!(
                    "expected an argument map, got {other}"
                )));
            }
        };

        Ok(Self {
            message: string_arg(map.get("message"), "message")?,
            recipients: string_arg(map.get("recipients"), "recipients")?,
            send_direct: match map.get("sendDirect") {
                None | Some(Value::Null) => false,
                Some(Value::Bool(b)) => *b,
                Some(other) => {
                    return Err(SmsError::InvalidArguments(format!(
                        "sendDirect must be a boolean, got {other}"
                    )));
                }
            },
        })
    }
}

fn string_arg(value: Option<&Value>, name: &str) -> Result<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SmsError::InvalidArguments(format!(
            "{name} must be a string, got {other}"
        ))),
    }
}

/// Split a raw recipient list into individual numbers.
///
/// Whitespace around each entry is trimmed and empty entries are dropped.
pub fn split_recipients(raw: &str, separator: char) -> Vec<&str> {
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
