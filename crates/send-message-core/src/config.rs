// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What to do when a direct send arrives while another is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Fail the new request with `SendInProgress`; the in-flight send is untouched.
    #[default]
    Reject,
    /// Cancel the in-flight send and start the new one.
    Replace,
}

/// Settings shared by the plugin, the correlator and the platform layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the framework method channel.
    pub channel_name: String,
    /// Request code passed to the permission prompt.
    pub permission_request_code: i32,
    /// Request code passed when launching the compose dialog.
    pub send_request_code: i32,
    /// Broadcast action fired by the platform when a message leaves the device.
    pub sent_action: String,
    /// Separator between numbers in the raw recipient string.
    pub recipient_separator: char,
    /// Messages longer than this many UTF-8 bytes go out as multipart SMS.
    pub multipart_threshold: usize,
    pub overlap_policy: OverlapPolicy,
    /// A pending send older than this no longer blocks new sends; it is
    /// resolved with `TimedOut` when the next send arrives.
    pub pending_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: "send_message".into(),
            permission_request_code: 206,
            send_request_code: 205,
            sent_action: "SMS_SENT_ACTION".into(),
            recipient_separator: ';',
            multipart_threshold: 80,
            overlap_policy: OverlapPolicy::Reject,
            pending_timeout_secs: 120,
        }
    }
}

impl BridgeConfig {
    /// Load a JSON config file. Fields absent from the file keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }

    /// Whether `message` must be split into parts before sending.
    pub fn needs_multipart(&self, message: &str) -> bool {
        message.len() > self.multipart_threshold
    }
}
