// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the SMS bridge.

use thiserror::Error;

/// Top-level error type for all bridge operations.
///
/// Every variant has a stable channel code (see [`SmsError::code`]) which is
/// what the framework side matches on. The display string is the message
/// shown alongside it.
#[derive(Debug, Error)]
pub enum SmsError {
    // -- Host context --
    #[error("Activity is not available")]
    NoActivityContext,

    #[error("SmsManager is not available")]
    NoPlatformService,

    // -- Send lifecycle --
    #[error("Permission denied")]
    PermissionDenied,

    #[error("SMS failed")]
    DeliveryFailed,

    #[error("another SMS send is in progress")]
    SendInProgress,

    #[error("SMS send was cancelled")]
    Cancelled,

    #[error("SMS send timed out waiting for the platform")]
    TimedOut,

    // -- Method channel --
    #[error("method not implemented: {0}")]
    NotImplemented(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Config / harness I/O --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SmsError {
    /// Stable error code reported over the method channel.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActivityContext => "no_activity",
            Self::NoPlatformService => "no_sms_manager",
            Self::PermissionDenied => "permission_denied",
            Self::DeliveryFailed => "sms_failed",
            Self::SendInProgress => "send_in_progress",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::NotImplemented(_) => "not_implemented",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Bridge(_) => "bridge_error",
            Self::PlatformUnavailable => "unavailable",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SmsError>;
