// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub platform for desktop/CI builds where telephony is unavailable.
//
// Sends fail with `PlatformUnavailable`; the real implementation lives in the
// `android` module.

use send_message_core::error::{Result, SmsError};
use send_message_core::types::OperationId;

use crate::traits::SmsPlatform;

/// No-op platform returned on non-mobile targets.
pub struct StubPlatform;

impl SmsPlatform for StubPlatform {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn check_precondition(&self) -> bool {
        false
    }

    fn request_precondition(&self) -> Result<()> {
        tracing::warn!("SmsPlatform::request_precondition called on stub platform");
        Err(SmsError::PlatformUnavailable)
    }

    fn perform_send(&self, _id: OperationId, _message: &str, _recipients: &str) -> Result<usize> {
        tracing::warn!("SmsPlatform::perform_send called on stub platform");
        Err(SmsError::PlatformUnavailable)
    }

    fn send_via_dialog(&self, _message: &str, _recipients: &str) -> Result<()> {
        tracing::warn!("SmsPlatform::send_via_dialog called on stub platform");
        Err(SmsError::PlatformUnavailable)
    }

    fn can_send_sms(&self) -> bool {
        false
    }
}
