// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-use result handles for method calls.
//
// A `ResultHandle` is consumed when it is resolved, so a call can be answered
// at most once. The caller keeps the paired `PendingResult`. If the handle is
// dropped unresolved (teardown, a lost operation) the caller observes
// `SmsError::Cancelled` instead of waiting forever.

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use send_message_core::SmsError;

/// What a method call eventually resolves to.
pub type CallOutcome = std::result::Result<Value, SmsError>;

/// Producer half: answers one method call.
pub struct ResultHandle {
    tx: oneshot::Sender<CallOutcome>,
}

impl std::fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandle")
            .field("caller_waiting", &!self.tx.is_closed())
            .finish()
    }
}

impl ResultHandle {
    /// Create a handle and the receiver the caller waits on.
    pub fn channel() -> (Self, PendingResult) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, PendingResult { rx: Some(rx) })
    }

    /// Resolve with a success value.
    ///
    /// Returns `false` if the caller already stopped listening.
    pub fn success(self, value: impl Into<Value>) -> bool {
        self.resolve(Ok(value.into()))
    }

    /// Resolve with an error.
    pub fn error(self, err: SmsError) -> bool {
        self.resolve(Err(err))
    }

    pub fn resolve(self, outcome: CallOutcome) -> bool {
        let delivered = self.tx.send(outcome).is_ok();
        if !delivered {
            tracing::debug!("result dropped: caller no longer waiting");
        }
        delivered
    }
}

/// Consumer half: the caller's view of an outstanding call.
#[derive(Debug)]
pub struct PendingResult {
    rx: Option<oneshot::Receiver<CallOutcome>>,
}

impl PendingResult {
    /// Take the outcome if the call has been answered.
    ///
    /// Returns `None` while the call is still outstanding, and after the
    /// outcome has already been taken.
    pub fn try_take(&mut self) -> Option<CallOutcome> {
        let rx = self.rx.as_mut()?;
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(SmsError::Cancelled),
        };
        self.rx = None;
        Some(outcome)
    }

    /// Wait for the outcome.
    pub async fn wait(mut self) -> CallOutcome {
        match self.rx.take() {
            Some(rx) => rx.await.unwrap_or(Err(SmsError::Cancelled)),
            None => Err(SmsError::Cancelled),
        }
    }
}
