// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{RecognitionError, Result};

/// Opaque token required to open a recognition session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank tokens.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Source of the credential used when a session is created.
pub trait TokenProvider: Send + Sync {
    /// Fails with `TokenMissing` when no credential is available.
    fn current_token(&self) -> Result<Credential>;
}

/// Provider backed by a fixed token, typically one read from configuration.
pub struct StaticTokenProvider {
    token: Option<Credential>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.and_then(Credential::new),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn current_token(&self) -> Result<Credential> {
        self.token.clone().ok_or(RecognitionError::TokenMissing)
    }
}

/// Runtime-replaceable credential layered over an optional fallback provider.
///
/// The value is read once per session creation, so replacing it never affects
/// a session that is already running.
#[derive(Clone, Default)]
pub struct CredentialStore {
    current: Arc<RwLock<Option<Credential>>>,
    fallback: Option<Arc<dyn TokenProvider>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: Arc<dyn TokenProvider>) -> Self {
        Self {
            current: Arc::default(),
            fallback: Some(fallback),
        }
    }

    /// Replace the credential for the next session. A blank token clears it.
    pub fn set(&self, token: &str) {
        let credential = Credential::new(token);
        debug!(target: "session", present = credential.is_some(), "credential replaced");
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = credential;
    }
}

impl TokenProvider for CredentialStore {
    fn current_token(&self) -> Result<Credential> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        match (current, &self.fallback) {
            (Some(credential), _) => Ok(credential),
            (None, Some(fallback)) => fallback.current_token(),
            (None, None) => Err(RecognitionError::TokenMissing),
        }
    }
}
