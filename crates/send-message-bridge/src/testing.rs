// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recording platform used by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use send_message_core::error::{Result, SmsError};
use send_message_core::types::{OperationId, split_recipients};

use crate::traits::SmsPlatform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    RequestPrecondition,
    PerformSend { message: String, recipients: String },
    SendViaDialog { message: String, recipients: String },
}

/// Records every outbound call and answers from configurable flags.
#[derive(Default)]
pub struct RecordingPlatform {
    pub permission_granted: AtomicBool,
    pub can_send: AtomicBool,
    /// When set, `perform_send` fails with `NoPlatformService`.
    pub fail_send: AtomicBool,
    /// When set, `request_precondition` fails with `NoActivityContext`.
    pub fail_prompt: AtomicBool,
    /// Broadcasts `perform_send` announces. Defaults to one per recipient.
    pub confirmations: Mutex<Option<usize>>,
    calls: Mutex<Vec<PlatformCall>>,
    send_ids: Mutex<Vec<OperationId>>,
}

impl RecordingPlatform {
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PlatformCall::PerformSend { .. }))
            .count()
    }

    pub fn prompts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PlatformCall::RequestPrecondition))
            .count()
    }

    /// Id of the most recent `perform_send`.
    pub fn last_send_id(&self) -> Option<OperationId> {
        self.send_ids.lock().unwrap().last().copied()
    }

    pub fn expect_confirmations(&self, count: usize) {
        *self.confirmations.lock().unwrap() = Some(count);
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SmsPlatform for RecordingPlatform {
    fn platform_name(&self) -> &str {
        "recording"
    }

    fn check_precondition(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    fn request_precondition(&self) -> Result<()> {
        self.record(PlatformCall::RequestPrecondition);
        if self.fail_prompt.load(Ordering::SeqCst) {
            return Err(SmsError::NoActivityContext);
        }
        Ok(())
    }

    fn perform_send(&self, id: OperationId, message: &str, recipients: &str) -> Result<usize> {
        self.record(PlatformCall::PerformSend {
            message: message.into(),
            recipients: recipients.into(),
        });
        self.send_ids.lock().unwrap().push(id);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(SmsError::NoPlatformService);
        }
        let count = *self.confirmations.lock().unwrap();
        Ok(count.unwrap_or_else(|| split_recipients(recipients, ';').len()))
    }

    fn send_via_dialog(&self, message: &str, recipients: &str) -> Result<()> {
        self.record(PlatformCall::SendViaDialog {
            message: message.into(),
            recipients: recipients.into(),
        });
        Ok(())
    }

    fn can_send_sms(&self) -> bool {
        self.can_send.load(Ordering::SeqCst)
    }
}
