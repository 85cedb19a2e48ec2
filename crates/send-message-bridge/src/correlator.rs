// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pending send correlation.
//
// A direct send completes through up to two platform callbacks that arrive
// at arbitrary times and possibly on different threads: the permission
// decision and the sent-broadcasts. The correlator keeps the single in-flight
// send in a slot and resolves its result handle once the platform has
// reported back for every part it announced. Callbacks with nothing to match
// are ignored.
//
// Every read-modify-clear of the slot happens under one mutex. Platform
// calls are made after the lock is released, so a platform that reports back
// synchronously cannot deadlock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use send_message_core::error::SmsError;
use send_message_core::types::{DeliveryOutcome, OperationId, PendingStage, SEND_CONFIRMATION};
use send_message_core::OverlapPolicy;

use crate::result::ResultHandle;
use crate::traits::SmsPlatform;

/// The send currently in flight.
struct PendingOperation {
    id: OperationId,
    message: String,
    recipients: String,
    handle: ResultHandle,
    stage: PendingStage,
    created_at: DateTime<Utc>,
    /// Broadcasts announced by `perform_send`; `None` until it returns.
    expected: Option<usize>,
    received: usize,
    failed: bool,
}

impl PendingOperation {
    fn new(
        id: OperationId,
        message: String,
        recipients: String,
        handle: ResultHandle,
        stage: PendingStage,
    ) -> Self {
        Self {
            id,
            message,
            recipients,
            handle,
            stage,
            created_at: Utc::now(),
            expected: None,
            received: 0,
            failed: false,
        }
    }

    fn age_ms(&self) -> i64 {
        (Utc::now() - self.created_at).num_milliseconds()
    }

    fn is_stale(&self, timeout: Option<Duration>) -> bool {
        let Some(timeout) = timeout else {
            return false;
        };
        (Utc::now() - self.created_at)
            .to_std()
            .is_ok_and(|age| age >= timeout)
    }

    fn is_complete(&self) -> bool {
        self.expected.is_some_and(|expected| self.received >= expected)
    }

    fn resolve(self) {
        info!(
            op_id = %self.id,
            received = self.received,
            failed = self.failed,
            age_ms = self.age_ms(),
            "send completed"
        );
        if self.failed {
            self.handle.error(SmsError::DeliveryFailed);
        } else {
            self.handle.success(SEND_CONFIRMATION);
        }
    }
}

/// Correlates asynchronous permission and delivery callbacks with the
/// caller that requested the send.
pub struct Correlator {
    platform: Arc<dyn SmsPlatform>,
    policy: OverlapPolicy,
    pending_timeout: Option<Duration>,
    slot: Mutex<Option<PendingOperation>>,
}

impl Correlator {
    pub fn new(platform: Arc<dyn SmsPlatform>, policy: OverlapPolicy) -> Self {
        Self {
            platform,
            policy,
            pending_timeout: None,
            slot: Mutex::new(None),
        }
    }

    /// A pending send older than `timeout` stops blocking new sends under
    /// [`OverlapPolicy::Reject`]: the next request resolves it with
    /// `TimedOut` and takes the slot. Without a timeout a send that never
    /// hears back blocks until [`shutdown`](Self::shutdown).
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = Some(timeout);
        self
    }

    // The slot is always left consistent, so a panic elsewhere while holding
    // the lock does not invalidate it.
    fn slot(&self) -> MutexGuard<'_, Option<PendingOperation>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a direct send.
    ///
    /// With the precondition satisfied the platform send is dispatched right
    /// away; otherwise the permission prompt is shown and the send waits for
    /// [`on_precondition_result`](Self::on_precondition_result).
    pub fn request_send(
        &self,
        message: String,
        recipients: String,
        handle: ResultHandle,
        precondition_satisfied: bool,
    ) {
        let stage = if precondition_satisfied {
            PendingStage::AwaitingDelivery
        } else {
            PendingStage::AwaitingPermission
        };
        let id = OperationId::new();
        let payload = precondition_satisfied.then(|| (message.clone(), recipients.clone()));

        let mut slot = self.slot();
        let mut timed_out = None;
        if self.policy == OverlapPolicy::Reject {
            let current = slot
                .as_ref()
                .map(|op| (op.id, op.is_stale(self.pending_timeout)));
            match current {
                Some((_, true)) => timed_out = slot.take(),
                Some((in_flight, false)) => {
                    drop(slot);
                    warn!(op_id = %id, in_flight = %in_flight, "send rejected: another send is pending");
                    handle.error(SmsError::SendInProgress);
                    return;
                }
                None => {}
            }
        }
        let displaced = slot.replace(PendingOperation::new(id, message, recipients, handle, stage));
        drop(slot);

        if let Some(old) = timed_out {
            warn!(
                op_id = %old.id,
                stage = ?old.stage,
                age_ms = old.age_ms(),
                replaced_by = %id,
                "pending send timed out"
            );
            old.handle.error(SmsError::TimedOut);
        }
        if let Some(old) = displaced {
            warn!(op_id = %old.id, replaced_by = %id, "pending send cancelled by a newer request");
            old.handle.error(SmsError::Cancelled);
        }

        info!(op_id = %id, stage = ?stage, "send requested");
        match payload {
            Some((message, recipients)) => self.dispatch(id, &message, &recipients),
            None => {
                if let Err(err) = self.platform.request_precondition() {
                    self.fail_current(id, err, "permission prompt failed");
                }
            }
        }
    }

    /// Feed the permission prompt's decision.
    ///
    /// Only a send in [`PendingStage::AwaitingPermission`] consumes it. With
    /// no send pending, or once the send has been dispatched, the result is
    /// logged and dropped; a repeated grant never sends twice.
    pub fn on_precondition_result(&self, granted: bool) {
        let mut slot = self.slot();
        match slot.as_ref().map(|op| op.stage) {
            None => {
                debug!(granted, "permission result with no pending send");
                return;
            }
            Some(PendingStage::AwaitingDelivery) => {
                debug!(granted, "permission result ignored: send already dispatched");
                return;
            }
            Some(PendingStage::AwaitingPermission) => {}
        }

        if !granted {
            let op = slot.take();
            drop(slot);
            if let Some(op) = op {
                info!(op_id = %op.id, age_ms = op.age_ms(), "permission denied");
                op.handle.error(SmsError::PermissionDenied);
            }
            return;
        }

        let Some(op) = slot.as_mut() else {
            return;
        };
        op.stage = PendingStage::AwaitingDelivery;
        let (id, message, recipients) = (op.id, op.message.clone(), op.recipients.clone());
        drop(slot);

        info!(op_id = %id, "permission granted, dispatching send");
        self.dispatch(id, &message, &recipients);
    }

    /// Feed one sent-broadcast that carries no operation tag.
    ///
    /// Only a send in [`PendingStage::AwaitingDelivery`] counts it; a
    /// broadcast while the permission prompt is still up, or with nothing
    /// pending, is logged and dropped. The send resolves once as many
    /// broadcasts arrived as `perform_send` announced, with `DeliveryFailed`
    /// if any of them reported a failure.
    pub fn on_delivery_result(&self, outcome: DeliveryOutcome) {
        self.deliver(None, outcome);
    }

    /// Like [`on_delivery_result`](Self::on_delivery_result), for a
    /// broadcast tagged with the operation it belongs to. A tag that does not
    /// match the pending send (a late broadcast of an earlier send) is
    /// dropped.
    pub fn on_delivery_result_for(&self, id: OperationId, outcome: DeliveryOutcome) {
        self.deliver(Some(id), outcome);
    }

    fn deliver(&self, tag: Option<OperationId>, outcome: DeliveryOutcome) {
        let op = {
            let mut slot = self.slot();
            let Some(op) = slot.as_mut() else {
                debug!(?outcome, "delivery result with no pending send");
                return;
            };
            if tag.is_some_and(|tag| tag != op.id) {
                debug!(?outcome, tag = ?tag, op_id = %op.id, "delivery result for another send ignored");
                return;
            }
            if op.stage == PendingStage::AwaitingPermission {
                debug!(?outcome, "delivery result ignored: send not dispatched yet");
                return;
            }

            op.received += 1;
            op.failed |= outcome == DeliveryOutcome::Failure;
            debug!(op_id = %op.id, ?outcome, received = op.received, expected = ?op.expected, "delivery result");
            let complete = op.is_complete();
            if !complete {
                return;
            }
            slot.take()
        };
        if let Some(op) = op {
            op.resolve();
        }
    }

    /// Resolve any pending send with `Cancelled`. Called on teardown.
    pub fn shutdown(&self) {
        let op = self.slot().take();
        if let Some(op) = op {
            info!(op_id = %op.id, stage = ?op.stage, "pending send cancelled on shutdown");
            op.handle.error(SmsError::Cancelled);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    pub fn pending_stage(&self) -> Option<PendingStage> {
        self.slot().as_ref().map(|op| op.stage)
    }

    /// Id of the send in the slot, if any.
    pub fn pending_id(&self) -> Option<OperationId> {
        self.slot().as_ref().map(|op| op.id)
    }

    /// Run the platform send for operation `id` and record how many
    /// broadcasts to wait for. Broadcasts that arrived while the platform
    /// call was running are already counted.
    fn dispatch(&self, id: OperationId, message: &str, recipients: &str) {
        let expected = match self.platform.perform_send(id, message, recipients) {
            Ok(expected) => expected,
            Err(err) => {
                self.fail_current(id, err, "platform send failed");
                return;
            }
        };

        let done = {
            let mut slot = self.slot();
            let complete = match slot.as_mut() {
                Some(op) if op.id == id => {
                    op.expected = Some(expected);
                    op.is_complete()
                }
                _ => false,
            };
            if complete { slot.take() } else { None }
        };
        match done {
            Some(op) => op.resolve(),
            None => debug!(op_id = %id, expected, "send dispatched, awaiting delivery"),
        }
    }

    /// Resolve operation `id` with a synchronous platform error, provided it
    /// is still the one in the slot.
    fn fail_current(&self, id: OperationId, err: SmsError, what: &str) {
        let failed = {
            let mut slot = self.slot();
            if slot.as_ref().is_some_and(|op| op.id == id) {
                slot.take()
            } else {
                None
            }
        };
        match failed {
            Some(op) => {
                warn!(op_id = %id, error = %err, "{what}");
                op.handle.error(err);
            }
            None => warn!(op_id = %id, error = %err, "{what} after the send was resolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use serde_json::Value;

    use crate::result::PendingResult;
    use crate::testing::{PlatformCall, RecordingPlatform};

    fn setup(policy: OverlapPolicy) -> (Arc<RecordingPlatform>, Correlator) {
        let platform = Arc::new(RecordingPlatform::default());
        let correlator = Correlator::new(platform.clone(), policy);
        (platform, correlator)
    }

    fn send(correlator: &Correlator, satisfied: bool) -> PendingResult {
        let (handle, pending) = ResultHandle::channel();
        correlator.request_send("hi".into(), "12345".into(), handle, satisfied);
        pending
    }

    #[test]
    fn satisfied_precondition_sends_without_prompt() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, true);

        assert_eq!(platform.sends(), 1);
        assert_eq!(platform.prompts(), 0);
        assert_eq!(correlator.pending_stage(), Some(PendingStage::AwaitingDelivery));
        assert!(h1.try_take().is_none());
    }

    #[test]
    fn permission_flow_resolves_after_delivery() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, false);

        assert_eq!(platform.calls(), vec![PlatformCall::RequestPrecondition]);
        assert_eq!(platform.sends(), 0);

        correlator.on_precondition_result(true);
        assert_eq!(
            platform.calls()[1],
            PlatformCall::PerformSend {
                message: "hi".into(),
                recipients: "12345".into(),
            }
        );
        assert_eq!(platform.sends(), 1);
        assert!(h1.try_take().is_none());

        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert_eq!(h1.try_take().unwrap().unwrap(), Value::from(SEND_CONFIRMATION));
        assert!(!correlator.is_pending());
    }

    #[test]
    fn delivery_failure_resolves_error() {
        let (_platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, true);

        correlator.on_delivery_result(DeliveryOutcome::Failure);
        assert!(matches!(h1.try_take(), Some(Err(SmsError::DeliveryFailed))));
        assert!(!correlator.is_pending());
    }

    #[test]
    fn denial_clears_slot_and_later_delivery_is_ignored() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, false);

        correlator.on_precondition_result(false);
        assert!(matches!(h1.try_take(), Some(Err(SmsError::PermissionDenied))));
        assert!(!correlator.is_pending());

        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert_eq!(platform.sends(), 0);
        assert!(!correlator.is_pending());
    }

    #[test]
    fn duplicate_delivery_is_a_no_op() {
        let (_platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, true);

        correlator.on_delivery_result(DeliveryOutcome::Success);
        correlator.on_delivery_result(DeliveryOutcome::Failure);
        assert!(h1.try_take().unwrap().is_ok());
        assert!(!correlator.is_pending());
    }

    #[test]
    fn callbacks_without_pending_send_do_nothing() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        correlator.on_precondition_result(true);
        correlator.on_precondition_result(false);
        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert!(platform.calls().is_empty());
        assert!(!correlator.is_pending());
    }

    #[test]
    fn delivery_before_permission_is_ignored() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, false);

        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert!(h1.try_take().is_none());
        assert_eq!(correlator.pending_stage(), Some(PendingStage::AwaitingPermission));

        correlator.on_precondition_result(true);
        assert_eq!(platform.sends(), 1);
    }

    #[test]
    fn repeated_grant_does_not_resend() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let _h1 = send(&correlator, false);

        correlator.on_precondition_result(true);
        correlator.on_precondition_result(true);
        assert_eq!(platform.sends(), 1);
    }

    #[test]
    fn synchronous_send_failure_resolves_immediately() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        platform.fail_send.store(true, Ordering::SeqCst);
        let mut h1 = send(&correlator, true);

        assert!(matches!(h1.try_take(), Some(Err(SmsError::NoPlatformService))));
        assert!(!correlator.is_pending());
    }

    #[test]
    fn prompt_failure_resolves_immediately() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        platform.fail_prompt.store(true, Ordering::SeqCst);
        let mut h1 = send(&correlator, false);

        assert!(matches!(h1.try_take(), Some(Err(SmsError::NoActivityContext))));
        assert!(!correlator.is_pending());
        assert_eq!(platform.sends(), 0);
    }

    #[test]
    fn reject_policy_fails_second_send() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, false);
        let mut h2 = send(&correlator, true);

        assert!(matches!(h2.try_take(), Some(Err(SmsError::SendInProgress))));
        assert!(h1.try_take().is_none());
        assert_eq!(platform.calls(), vec![PlatformCall::RequestPrecondition]);
        assert_eq!(correlator.pending_stage(), Some(PendingStage::AwaitingPermission));
    }

    #[test]
    fn replace_policy_cancels_first_send() {
        let (platform, correlator) = setup(OverlapPolicy::Replace);
        let mut h1 = send(&correlator, false);
        let mut h2 = send(&correlator, true);

        assert!(matches!(h1.try_take(), Some(Err(SmsError::Cancelled))));
        assert_eq!(platform.sends(), 1);

        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert!(h2.try_take().unwrap().is_ok());
    }

    #[test]
    fn shutdown_cancels_pending_send() {
        let (_platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, true);

        correlator.shutdown();
        assert!(matches!(h1.try_take(), Some(Err(SmsError::Cancelled))));
        assert!(!correlator.is_pending());

        correlator.shutdown();
    }

    #[test]
    fn instances_do_not_share_state() {
        let (_p1, first) = setup(OverlapPolicy::Reject);
        let (_p2, second) = setup(OverlapPolicy::Reject);
        let _h1 = send(&first, true);

        assert!(first.is_pending());
        assert!(!second.is_pending());
    }

    #[test]
    fn stale_send_is_timed_out_by_the_next_request() {
        let platform = Arc::new(RecordingPlatform::default());
        let correlator = Correlator::new(platform.clone(), OverlapPolicy::Reject)
            .with_pending_timeout(Duration::ZERO);
        // The platform never fires the sent-broadcast for this send.
        let mut h1 = send(&correlator, true);
        assert!(h1.try_take().is_none());

        let mut h2 = send(&correlator, true);
        assert!(matches!(h1.try_take(), Some(Err(SmsError::TimedOut))));
        assert!(h2.try_take().is_none());
        assert_eq!(platform.sends(), 2);

        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert!(h2.try_take().unwrap().is_ok());
    }

    #[test]
    fn fresh_send_still_blocks_under_timeout() {
        let platform = Arc::new(RecordingPlatform::default());
        let correlator = Correlator::new(platform.clone(), OverlapPolicy::Reject)
            .with_pending_timeout(Duration::from_secs(3600));
        let mut h1 = send(&correlator, true);
        let mut h2 = send(&correlator, true);

        assert!(matches!(h2.try_take(), Some(Err(SmsError::SendInProgress))));
        assert!(h1.try_take().is_none());
        assert_eq!(platform.sends(), 1);
    }

    #[test]
    fn every_recipient_must_report_before_resolving() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let (handle, mut h1) = ResultHandle::channel();
        correlator.request_send("hi".into(), "111;222;333".into(), handle, true);
        assert_eq!(platform.sends(), 1);

        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert!(h1.try_take().is_none());
        correlator.on_delivery_result(DeliveryOutcome::Failure);
        assert!(h1.try_take().is_none());
        assert!(correlator.is_pending());

        correlator.on_delivery_result(DeliveryOutcome::Success);
        assert!(matches!(h1.try_take(), Some(Err(SmsError::DeliveryFailed))));
        assert!(!correlator.is_pending());
    }

    #[test]
    fn late_broadcast_of_earlier_send_is_ignored() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        let mut h1 = send(&correlator, true);
        let first = platform.last_send_id().unwrap();
        correlator.on_delivery_result_for(first, DeliveryOutcome::Success);
        assert!(h1.try_take().unwrap().is_ok());

        let mut h2 = send(&correlator, true);
        let second = platform.last_send_id().unwrap();
        assert_ne!(first, second);
        assert_eq!(correlator.pending_id(), Some(second));

        correlator.on_delivery_result_for(first, DeliveryOutcome::Failure);
        assert!(h2.try_take().is_none());
        assert!(correlator.is_pending());

        correlator.on_delivery_result_for(second, DeliveryOutcome::Success);
        assert!(h2.try_take().unwrap().is_ok());
    }

    #[test]
    fn no_announced_broadcast_resolves_on_dispatch() {
        let (platform, correlator) = setup(OverlapPolicy::Reject);
        platform.expect_confirmations(0);
        let mut h1 = send(&correlator, true);

        assert_eq!(h1.try_take().unwrap().unwrap(), Value::from(SEND_CONFIRMATION));
        assert!(!correlator.is_pending());
    }

    #[tokio::test]
    async fn callbacks_from_other_threads_resolve_once() {
        let platform = Arc::new(RecordingPlatform::default());
        let correlator = Arc::new(Correlator::new(platform.clone(), OverlapPolicy::Reject));
        let (handle, pending) = ResultHandle::channel();
        correlator.request_send("hi".into(), "12345".into(), handle, true);

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let correlator = Arc::clone(&correlator);
                std::thread::spawn(move || {
                    let outcome = if i % 2 == 0 {
                        DeliveryOutcome::Success
                    } else {
                        DeliveryOutcome::Failure
                    };
                    correlator.on_delivery_result(outcome);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let outcome = pending.wait().await;
        assert!(matches!(outcome, Ok(_) | Err(SmsError::DeliveryFailed)));
        assert!(!correlator.is_pending());
        assert_eq!(platform.sends(), 1);
    }
}
