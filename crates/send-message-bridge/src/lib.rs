// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// send-message — Native SMS bridge.
//
// The framework talks to `SmsPlugin` over a method channel. Direct sends go
// through the `Correlator`, which holds the single in-flight request until
// the permission prompt and the sent-broadcast report back. Everything that
// touches the operating system sits behind the `SmsPlatform` trait.

use std::sync::Arc;

use send_message_core::BridgeConfig;

pub mod correlator;
pub mod plugin;
pub mod result;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

#[cfg(test)]
mod testing;

pub use correlator::Correlator;
pub use plugin::SmsPlugin;
pub use result::{PendingResult, ResultHandle};
pub use traits::SmsPlatform;

/// Returns the platform implementation for the target operating system.
#[cfg_attr(not(target_os = "android"), allow(unused_variables))]
pub fn platform(config: &BridgeConfig) -> Arc<dyn SmsPlatform> {
    #[cfg(target_os = "android")]
    {
        // Android: JNI calls into SmsManager / ActivityCompat.
        Arc::new(android::AndroidPlatform::new(config.clone()))
    }
    #[cfg(not(target_os = "android"))]
    {
        // DESKTOP/CI: no telephony, every send reports `PlatformUnavailable`.
        Arc::new(stub::StubPlatform)
    }
}
