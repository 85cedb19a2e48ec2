// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// send-message — Core types and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod response;
pub mod types;

pub use config::{BridgeConfig, OverlapPolicy};
pub use error::SmsError;
pub use response::ChannelResponse;
pub use types::*;
