// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait for the native SMS capability.

use send_message_core::error::Result;
use send_message_core::types::OperationId;

/// Everything the bridge needs from the operating system.
///
/// Methods that start an asynchronous platform flow return as soon as the
/// flow is started. Their outcome comes back later through the plugin's host
/// callbacks (`on_request_permissions_result`, `on_sent_broadcast`).
pub trait SmsPlatform: Send + Sync {
    /// Human-readable platform name (e.g. "Android").
    fn platform_name(&self) -> &str;

    /// Whether the SEND_SMS permission is currently granted.
    fn check_precondition(&self) -> bool;

    /// Show the permission prompt. The decision arrives asynchronously.
    ///
    /// An error means the prompt could not be shown and no decision will
    /// ever arrive.
    fn request_precondition(&self) -> Result<()>;

    /// Hand the message to the platform SMS service.
    ///
    /// `Ok(n)` means the send was dispatched and `n` sent-broadcasts will
    /// follow, each tagged with `id` where the platform supports it. With
    /// `n == 0` no broadcast is coming and the send counts as done.
    fn perform_send(&self, id: OperationId, message: &str, recipients: &str) -> Result<usize>;

    /// Open the system compose screen pre-filled with the message.
    fn send_via_dialog(&self, message: &str, recipients: &str) -> Result<()>;

    /// Whether this device can send SMS at all.
    fn can_send_sms(&self) -> bool;
}
