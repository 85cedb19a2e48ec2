// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Method-channel plugin.
//
// Dispatches `sendSMS` / `canSendSMS` calls from the framework and routes
// the host's permission and broadcast callbacks into the correlator.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use send_message_core::error::SmsError;
use send_message_core::types::{
    DeliveryOutcome, MethodCall, OperationId, PermissionStatus, SendRequest, SEND_CONFIRMATION,
    methods,
};
use send_message_core::BridgeConfig;

use crate::correlator::Correlator;
use crate::result::ResultHandle;
use crate::traits::SmsPlatform;

/// The plugin instance attached to one framework engine.
pub struct SmsPlugin {
    config: BridgeConfig,
    platform: Arc<dyn SmsPlatform>,
    correlator: Correlator,
}

impl SmsPlugin {
    pub fn new(platform: Arc<dyn SmsPlatform>, config: BridgeConfig) -> Self {
        let correlator = Correlator::new(Arc::clone(&platform), config.overlap_policy)
            .with_pending_timeout(config.pending_timeout());
        info!(
            platform = platform.platform_name(),
            channel = %config.channel_name,
            "SMS plugin attached"
        );
        Self {
            config,
            platform,
            correlator,
        }
    }

    /// Plugin backed by the platform of the compile target.
    pub fn for_target(config: BridgeConfig) -> Self {
        let platform = crate::platform(&config);
        Self::new(platform, config)
    }

    pub fn channel_name(&self) -> &str {
        &self.config.channel_name
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Handle one call from the framework. `handle` is resolved now or, for
    /// direct sends, once the platform reports back.
    #[instrument(skip(self, call, handle), fields(method = %call.method))]
    pub fn handle_method_call(&self, call: MethodCall, handle: ResultHandle) {
        match call.method.as_str() {
            methods::SEND_SMS => match SendRequest::from_arguments(&call.arguments) {
                Ok(request) => self.send_sms(request, handle),
                Err(err) => {
                    warn!(error = %err, "rejecting sendSMS call");
                    handle.error(err);
                }
            },
            methods::CAN_SEND_SMS => {
                handle.success(self.platform.can_send_sms());
            }
            other => {
                debug!("method not implemented");
                handle.error(SmsError::NotImplemented(other.to_string()));
            }
        }
    }

    fn send_sms(&self, request: SendRequest, handle: ResultHandle) {
        let SendRequest {
            message,
            recipients,
            send_direct,
        } = request;

        if send_direct {
            let granted = self.platform.check_precondition();
            self.correlator
                .request_send(message, recipients, handle, granted);
            return;
        }

        // The compose dialog hands control to the user; there is nothing to
        // correlate, the call succeeds once the dialog is launched.
        match self.platform.send_via_dialog(&message, &recipients) {
            Ok(()) => handle.success(SEND_CONFIRMATION),
            Err(err) => {
                warn!(error = %err, "compose dialog failed");
                handle.error(err)
            }
        };
    }

    /// Host callback for a permission-request result.
    ///
    /// Returns `false` when `request_code` belongs to someone else.
    #[instrument(skip(self, grant_results))]
    pub fn on_request_permissions_result(
        &self,
        request_code: i32,
        grant_results: &[PermissionStatus],
    ) -> bool {
        if request_code != self.config.permission_request_code {
            return false;
        }
        let granted = grant_results.first() == Some(&PermissionStatus::Granted);
        self.correlator.on_precondition_result(granted);
        true
    }

    /// Host callback for a broadcast; only the sent action is consumed.
    ///
    /// `op_id` is the `OP_ID_EXTRA` string carried by the intent. When present
    /// the broadcast only counts toward that operation; an unreadable tag is
    /// dropped rather than credited to whatever send is pending.
    #[instrument(skip(self))]
    pub fn on_sent_broadcast(&self, action: &str, result_code: i32, op_id: Option<&str>) {
        if action != self.config.sent_action {
            debug!("ignoring unrelated broadcast");
            return;
        }
        let outcome = DeliveryOutcome::from_result_code(result_code);
        match op_id {
            None => self.correlator.on_delivery_result(outcome),
            Some(text) => match OperationId::parse(text) {
                Some(id) => self.correlator.on_delivery_result_for(id, outcome),
                None => warn!("ignoring sent broadcast with malformed operation tag"),
            },
        }
    }

    /// Engine teardown. Any pending send is cancelled.
    pub fn detach(&self) {
        info!("SMS plugin detached");
        self.correlator.shutdown();
    }
}
