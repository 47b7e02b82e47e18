// SPDX-License-Identifier: GPL-3.0-or-later

//! Microphone-driven audio recognition with a single in-flight request.
//!
//! This crate provides:
//! - A session state machine that owns capture and the backend session
//! - Single-flight request admission with exactly-once settlement
//! - A capture engine running on a dedicated worker thread
//! - Normalisation of backend match events into caller-facing items

pub mod backend;
pub mod capture;
pub mod controller;
pub mod credential;
pub mod error;
pub mod guard;
pub mod item;
pub mod mapper;
pub mod recognizer;

pub use backend::{
    AudioFormat, AudioFrame, BackendError, EventStream, RecognitionBackend, RecognitionSession,
    SAMPLE_RATE_HZ,
};
pub use capture::{AudioCaptureEngine, AudioInput, CaptureError, CaptureExit, CaptureStream};
pub use controller::{SessionController, SessionState};
pub use credential::{Credential, CredentialStore, StaticTokenProvider, TokenProvider};
pub use error::{Outcome, RecognitionError, Result};
pub use guard::{Admission, RequestGuard, RequestToken};
pub use item::{MatchEvent, MatchedItem, MediaItem};
pub use recognizer::{Recognizer, RecognizerBuilder};
