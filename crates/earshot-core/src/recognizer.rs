// SPDX-License-Identifier: GPL-3.0-or-later

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::{AudioFormat, RecognitionBackend};
use crate::capture::AudioInput;
use crate::controller::{SessionController, SessionState};
use crate::credential::{CredentialStore, TokenProvider};
use crate::error::Outcome;

/// Caller-facing recognition surface: one listening request at a time.
///
/// # Example
/// ```no_run
/// # use std::sync::Arc;
/// # use earshot_core::{Recognizer, RecognitionBackend, AudioInput};
/// # async fn example(backend: Arc<dyn RecognitionBackend>, mic: Arc<dyn AudioInput>) {
/// let recognizer = Recognizer::builder(backend, mic).build();
/// recognizer.set_credential("developer-token");
///
/// match recognizer.start_listening().await {
///     Ok(items) => println!("matched {} item(s)", items.len()),
///     Err(err) => eprintln!("{}: {err}", err.code()),
/// }
/// # }
/// ```
pub struct Recognizer {
    controller: SessionController,
    credentials: CredentialStore,
    input: Arc<dyn AudioInput>,
}

impl Recognizer {
    pub fn builder(
        backend: Arc<dyn RecognitionBackend>,
        input: Arc<dyn AudioInput>,
    ) -> RecognizerBuilder {
        RecognizerBuilder::new(backend, input)
    }

    /// Whether recognition can be attempted on this platform. No side effects.
    pub fn is_available(&self) -> bool {
        self.input.is_available()
    }

    /// Replace the credential used for the next session; a running session keeps its own.
    pub fn set_credential(&self, token: &str) {
        self.credentials.set(token);
    }

    /// Start listening and resolve with the first recognition outcome.
    ///
    /// See [`SessionController::start`] for admission semantics.
    pub fn start_listening(&self) -> impl Future<Output = Outcome> + Send + 'static {
        self.controller.start()
    }

    /// Stop listening. Resolves `true` once any running session has been torn down.
    pub async fn stop_listening(&self) -> bool {
        self.controller.stop().await
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.controller.subscribe_state()
    }
}

/// Builder for [`Recognizer`].
pub struct RecognizerBuilder {
    backend: Arc<dyn RecognitionBackend>,
    input: Arc<dyn AudioInput>,
    format: AudioFormat,
    fallback: Option<Arc<dyn TokenProvider>>,
}

impl RecognizerBuilder {
    pub fn new(backend: Arc<dyn RecognitionBackend>, input: Arc<dyn AudioInput>) -> Self {
        Self {
            backend,
            input,
            format: AudioFormat::default(),
            fallback: None,
        }
    }

    /// Capture read size in bytes, also passed to the backend as its minimum buffer.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.format = AudioFormat::with_buffer_size(buffer_size);
        self
    }

    /// Provider consulted when no credential has been set at runtime.
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.fallback = Some(provider);
        self
    }

    pub fn build(self) -> Recognizer {
        let credentials = match self.fallback {
            Some(fallback) => CredentialStore::with_fallback(fallback),
            None => CredentialStore::new(),
        };

        let controller = SessionController::new(
            self.backend,
            Arc::new(credentials.clone()),
            self.input.clone(),
            self.format,
        );

        Recognizer {
            controller,
            credentials,
            input: self.input,
        }
    }
}
