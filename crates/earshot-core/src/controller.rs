// SPDX-License-Identifier: GPL-3.0-or-later

//! Session lifecycle: `Idle → Initializing → Capturing → Finalizing → Idle`.
//!
//! Each admitted request gets its own driver task. The driver creates the
//! backend session, starts capture, waits for whichever comes first of the
//! first match event, a capture failure, or an explicit stop, and then tears
//! everything down before settling the request. Teardown happens before
//! settlement so a caller that immediately starts again never overlaps a
//! session that still holds the device.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{AudioFormat, RecognitionBackend, RecognitionSession};
use crate::capture::{AudioCaptureEngine, AudioInput, CaptureExit};
use crate::credential::TokenProvider;
use crate::error::{Outcome, RecognitionError, Result};
use crate::guard::{RequestGuard, RequestToken};
use crate::mapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Capturing,
    Finalizing,
}

struct ActiveSession {
    token: RequestToken,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Shared {
    backend: Arc<dyn RecognitionBackend>,
    tokens: Arc<dyn TokenProvider>,
    input: Arc<dyn AudioInput>,
    format: AudioFormat,
    guard: RequestGuard,
    state: watch::Sender<SessionState>,
    active: Mutex<Option<ActiveSession>>,
}

impl Shared {
    fn set_state(&self, token: RequestToken, state: SessionState) {
        debug!(target: "session", %token, ?state, "state transition");
        self.state.send_replace(state);
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Orchestrates one recognition session at a time.
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn RecognitionBackend>,
        tokens: Arc<dyn TokenProvider>,
        input: Arc<dyn AudioInput>,
        format: AudioFormat,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            shared: Arc::new(Shared {
                backend,
                tokens,
                input,
                format,
                guard: RequestGuard::new(),
                state,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Admit a request and start its session.
    ///
    /// Admission happens when this is called, not when the future is first
    /// polled: a second call made before the first settles resolves to
    /// `AlreadyInProgress` straight away. Must be called within a tokio runtime.
    pub fn start(&self) -> impl Future<Output = Outcome> + Send + 'static {
        let admitted = self.admit();
        async move {
            match admitted {
                Ok(completion) => completion.await.unwrap_or(Err(RecognitionError::Cancelled)),
                Err(err) => Err(err),
            }
        }
    }

    fn admit(&self) -> Result<oneshot::Receiver<Outcome>> {
        let admission = self.shared.guard.admit()?;
        let token = admission.token;
        let (cancel, cancel_rx) = oneshot::channel();

        // Held across the spawn so the driver cannot clear the slot before it is filled.
        let mut active = self.shared.active();
        let task = tokio::spawn(run_session(self.shared.clone(), token, cancel_rx));
        *active = Some(ActiveSession {
            token,
            cancel,
            task,
        });

        info!(target: "session", %token, "listening request admitted");
        Ok(admission.completion)
    }

    /// Stop the current session, if any, and wait until it has been torn down.
    ///
    /// Always reports success; stopping while idle is a no-op.
    pub async fn stop(&self) -> bool {
        let active = self.shared.active().take();
        let Some(active) = active else {
            debug!(target: "session", "stop requested while idle");
            return true;
        };

        info!(target: "session", token = %active.token, "stop requested");
        let _ = active.cancel.send(());
        if let Err(err) = active.task.await {
            warn!(
                target: "session",
                token = %active.token,
                error = %err,
                "session task ended abnormally"
            );
        }
        true
    }
}

async fn run_session(
    shared: Arc<Shared>,
    token: RequestToken,
    mut cancel: oneshot::Receiver<()>,
) {
    let exit = SessionExit {
        shared: shared.clone(),
        token,
        done: false,
    };
    let outcome = drive(&shared, token, &mut cancel).await;
    exit.finish(outcome);
}

/// Settles the request when the driver returns, or when its task unwinds.
struct SessionExit {
    shared: Arc<Shared>,
    token: RequestToken,
    done: bool,
}

impl SessionExit {
    fn finish(mut self, outcome: Outcome) {
        self.done = true;
        conclude(&self.shared, self.token, outcome);
    }
}

impl Drop for SessionExit {
    fn drop(&mut self) {
        if !self.done {
            warn!(target: "session", token = %self.token, "session task failed before settling");
            conclude(
                &self.shared,
                self.token,
                Err(RecognitionError::Backend("session task failed".to_string())),
            );
        }
    }
}

/// Settle first, then return to `Idle`, so an observer of `Idle` can always start again.
fn conclude(shared: &Shared, token: RequestToken, outcome: Outcome) {
    match &outcome {
        Ok(items) => info!(target: "session", %token, items = items.len(), "recognition matched"),
        Err(err) => {
            info!(target: "session", %token, code = err.code(), error = %err, "recognition ended")
        }
    }
    shared.guard.settle(token, outcome);

    // A newer request may have been admitted since settling; its state wins.
    let mut active = shared.active();
    match active.as_ref() {
        Some(current) if current.token != token => {}
        _ => {
            active.take();
            shared.set_state(token, SessionState::Idle);
        }
    }
}

async fn drive(
    shared: &Shared,
    token: RequestToken,
    cancel: &mut oneshot::Receiver<()>,
) -> Outcome {
    shared.set_state(token, SessionState::Initializing);

    let credential = shared.tokens.current_token()?;

    let created = tokio::select! {
        biased;
        _ = &mut *cancel => return Err(RecognitionError::Cancelled),
        created = shared.backend.create_session(&credential, shared.format) => created,
    };
    let session: Arc<dyn RecognitionSession> = match created {
        Ok(session) => Arc::from(session),
        Err(err) => {
            warn!(target: "session", %token, reason = %err, "backend refused session");
            return Err(RecognitionError::SessionCreationFailed(err.reason));
        }
    };

    let mut events = session.events();
    let mut engine = AudioCaptureEngine::new(shared.input.clone(), shared.format);
    let mut capture_exit = match engine.start(session.clone()) {
        Ok(exit) => exit,
        Err(err) => {
            warn!(target: "session", %token, error = %err, "capture device failed to start");
            return Err(err.into());
        }
    };
    shared.set_state(token, SessionState::Capturing);

    // Event before capture exit: a read failure racing a result is redundant.
    let outcome = tokio::select! {
        biased;
        _ = &mut *cancel => Err(RecognitionError::Cancelled),
        event = events.next() => match event {
            Some(event) => mapper::map_event(event),
            None => Err(RecognitionError::Backend(
                "event stream ended without a result".to_string(),
            )),
        },
        exit = &mut capture_exit => Err(capture_failure(exit)),
    };

    shared.set_state(token, SessionState::Finalizing);
    drop(events);
    match tokio::task::spawn_blocking(move || engine.stop()).await {
        Ok(exit) => debug!(target: "session", %token, ?exit, "capture released"),
        Err(err) => warn!(target: "session", %token, error = %err, "capture shutdown task failed"),
    }
    drop(session);

    outcome
}

fn capture_failure(
    exit: std::result::Result<CaptureExit, oneshot::error::RecvError>,
) -> RecognitionError {
    match exit {
        Ok(CaptureExit::Failed(err)) => err.into(),
        Ok(CaptureExit::Stopped) => {
            RecognitionError::DeviceError("capture stopped unexpectedly".to_string())
        }
        Err(_) => {
            RecognitionError::DeviceError("capture worker exited without reporting".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;

    #[test]
    fn capture_failures_map_to_device_errors() {
        assert_eq!(
            capture_failure(Ok(CaptureExit::Failed(CaptureError::Device("gone".into())))),
            RecognitionError::DeviceError("gone".into())
        );
        assert!(matches!(
            capture_failure(Ok(CaptureExit::Stopped)),
            RecognitionError::DeviceError(_)
        ));
    }
}
