// SPDX-License-Identifier: GPL-3.0-or-later

//! Single-flight admission for listening requests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Outcome, RecognitionError, Result};

/// Freshness token identifying one admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

struct PendingRequest {
    token: RequestToken,
    completion: oneshot::Sender<Outcome>,
}

/// Caller's half of an admitted request.
#[derive(Debug)]
pub struct Admission {
    pub token: RequestToken,
    pub completion: oneshot::Receiver<Outcome>,
}

/// Holds at most one pending request and lets exactly one settlement through.
///
/// The slot is cleared in the same critical section that takes the completion
/// handle, so a new `admit` can succeed as soon as `settle` returns.
pub struct RequestGuard {
    slot: Mutex<Option<PendingRequest>>,
    next_token: AtomicU64,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_token: AtomicU64::new(1),
        }
    }

    /// Admit a new request, or fail with `AlreadyInProgress` leaving the current one untouched.
    pub fn admit(&self) -> Result<Admission> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = slot.as_ref() {
            debug!(
                target: "guard",
                pending = %pending.token,
                "request rejected: already in progress"
            );
            return Err(RecognitionError::AlreadyInProgress);
        }

        let token = RequestToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (completion, receiver) = oneshot::channel();
        *slot = Some(PendingRequest { token, completion });
        debug!(target: "guard", %token, "request admitted");

        Ok(Admission {
            token,
            completion: receiver,
        })
    }

    /// Settle the pending request if `token` still identifies it.
    ///
    /// Returns `false` for stale tokens and already-settled requests; neither is an error.
    pub fn settle(&self, token: RequestToken, outcome: Outcome) -> bool {
        let pending = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(pending) if pending.token == token => slot.take(),
                _ => None,
            }
        };

        let Some(pending) = pending else {
            debug!(target: "guard", %token, "ignoring settlement for stale or settled request");
            return false;
        };

        let succeeded = outcome.is_ok();
        if pending.completion.send(outcome).is_err() {
            warn!(target: "guard", %token, "caller stopped waiting before settlement");
        } else {
            debug!(target: "guard", %token, succeeded, "request settled");
        }
        true
    }

    pub fn pending(&self) -> Option<RequestToken> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|pending| pending.token)
    }
}

impl Default for RequestGuard {
    fn default() -> Self {
        Self::new()
    }
}
