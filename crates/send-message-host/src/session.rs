// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted session replay.
//
// A script lists method calls interleaved with the host callbacks the OS
// would deliver. Each call's response is reported once, at the step where it
// resolves; calls still outstanding at the end are reported as pending.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use send_message_bridge::{PendingResult, ResultHandle, SmsPlugin};
use send_message_core::error::Result;
use send_message_core::types::{MethodCall, PermissionStatus};
use send_message_core::{BridgeConfig, ChannelResponse};

use crate::simulated::SimulatedPlatform;

/// A session script.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Whether SEND_SMS is already granted when the session starts.
    #[serde(default)]
    pub permission_granted: bool,
    /// Answer to `canSendSMS`.
    #[serde(default = "default_can_send")]
    pub can_send: bool,
    pub steps: Vec<Step>,
}

fn default_can_send() -> bool {
    true
}

impl Script {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// One event in a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// A method call from the framework.
    Call(MethodCall),
    /// The OS reports the permission prompt's result.
    Permission { request_code: i32, granted: bool },
    /// The OS delivers a broadcast, optionally tagged with an operation id.
    Broadcast {
        action: String,
        result_code: i32,
        #[serde(default)]
        op_id: Option<String>,
    },
    /// The framework engine detaches.
    Detach,
}

/// A resolved (or still pending) call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub call: usize,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ChannelResponse>,
}

struct Outstanding {
    call: usize,
    method: String,
    result: PendingResult,
}

/// Replay `script` and return the reports in the order calls resolved.
pub fn replay(script: &Script, config: BridgeConfig) -> Vec<Report> {
    let platform = Arc::new(SimulatedPlatform::new(
        script.permission_granted,
        script.can_send,
        config.recipient_separator,
    ));
    let plugin = SmsPlugin::new(platform.clone(), config);

    let mut outstanding: Vec<Outstanding> = Vec::new();
    let mut reports = Vec::new();
    let mut calls = 0;

    for step in &script.steps {
        match step {
            Step::Call(call) => {
                let (handle, result) = ResultHandle::channel();
                outstanding.push(Outstanding {
                    call: calls,
                    method: call.method.clone(),
                    result,
                });
                calls += 1;
                plugin.handle_method_call(call.clone(), handle);
            }
            Step::Permission {
                request_code,
                granted,
            } => {
                if *request_code == plugin.config().permission_request_code {
                    platform.set_permission(*granted);
                }
                let status = if *granted {
                    PermissionStatus::Granted
                } else {
                    PermissionStatus::Denied
                };
                if !plugin.on_request_permissions_result(*request_code, &[status]) {
                    tracing::debug!(request_code, "permission result not handled by plugin");
                }
            }
            Step::Broadcast {
                action,
                result_code,
                op_id,
            } => plugin.on_sent_broadcast(action, *result_code, op_id.as_deref()),
            Step::Detach => plugin.detach(),
        }
        collect_resolved(&mut outstanding, &mut reports);
    }

    reports.extend(outstanding.into_iter().map(|o| Report {
        call: o.call,
        method: o.method,
        response: None,
    }));
    reports
}

fn collect_resolved(outstanding: &mut Vec<Outstanding>, reports: &mut Vec<Report>) {
    let mut still_waiting = Vec::with_capacity(outstanding.len());
    for mut o in outstanding.drain(..) {
        match o.result.try_take() {
            Some(outcome) => reports.push(Report {
                call: o.call,
                method: o.method,
                response: Some(ChannelResponse::from(outcome)),
            }),
            None => still_waiting.push(o),
        }
    }
    *outstanding = still_waiting;
}
