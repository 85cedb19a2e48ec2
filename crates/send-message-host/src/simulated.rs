// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simulated platform for replaying sessions on desktop.
//
// Sends and dialogs always dispatch; the script decides what the permission
// prompt and the sent-broadcasts report. Like the device, a direct send
// announces one sent-broadcast per recipient.

use std::sync::atomic::{AtomicBool, Ordering};

use send_message_bridge::SmsPlatform;
use send_message_core::error::{Result, SmsError};
use send_message_core::types::{OperationId, split_recipients};

pub struct SimulatedPlatform {
    permission_granted: AtomicBool,
    can_send: bool,
    separator: char,
}

impl SimulatedPlatform {
    pub fn new(permission_granted: bool, can_send: bool, separator: char) -> Self {
        Self {
            permission_granted: AtomicBool::new(permission_granted),
            can_send,
            separator,
        }
    }

    /// Record the user's answer to the prompt, as the OS would.
    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }
}

impl SmsPlatform for SimulatedPlatform {
    fn platform_name(&self) -> &str {
        "Simulated"
    }

    fn check_precondition(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    fn request_precondition(&self) -> Result<()> {
        tracing::info!("simulated permission prompt shown");
        Ok(())
    }

    fn perform_send(&self, id: OperationId, message: &str, recipients: &str) -> Result<usize> {
        let numbers = split_recipients(recipients, self.separator);
        if numbers.is_empty() {
            return Err(SmsError::InvalidArguments("no recipients".into()));
        }
        tracing::info!(op_id = %id, recipients, bytes = message.len(), "simulated SMS dispatched");
        Ok(numbers.len())
    }

    fn send_via_dialog(&self, message: &str, recipients: &str) -> Result<()> {
        tracing::info!(recipients, bytes = message.len(), "simulated compose dialog opened");
        Ok(())
    }

    fn can_send_sms(&self) -> bool {
        self.can_send
    }
}
