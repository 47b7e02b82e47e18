// SPDX-License-Identifier: GPL-3.0-or-later

//! Seams to the recognition backend. The core never looks inside a session;
//! it only feeds frames in and reads events out.

use std::time::Duration;

use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::credential::Credential;
use crate::item::MatchEvent;

/// Capture sample rate in Hz. Frames are always mono, 16-bit signed little-endian PCM.
pub const SAMPLE_RATE_HZ: u32 = 48_000;

/// Fixed capture format shared by the capture engine and the backend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    /// Bytes per capture read, and the backend's minimum buffer size.
    pub buffer_size: usize,
}

impl AudioFormat {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ,
            buffer_size,
        }
    }

    /// Audio duration represented by `bytes` of PCM in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let samples = (bytes / 2) as u64;
        Duration::from_micros(samples * 1_000_000 / u64::from(self.sample_rate.max(1)))
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::with_buffer_size(8192)
    }
}

/// One capture read. Borrowed for the duration of `push_frame` only.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    pub bytes: &'a [u8],
    /// Monotonic time since capture started.
    pub timestamp: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct BackendError {
    pub reason: String,
}

impl BackendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Lazily produced match events, unbounded until the consumer drops it.
pub type EventStream = BoxStream<'static, MatchEvent>;

#[async_trait::async_trait]
pub trait RecognitionBackend: Send + Sync + 'static {
    async fn create_session(
        &self,
        credential: &Credential,
        format: AudioFormat,
    ) -> Result<Box<dyn RecognitionSession>, BackendError>;
}

/// A running recognition attempt.
///
/// `push_frame` is called from the capture worker thread, so it must not block
/// for long. Dropping the session releases it.
pub trait RecognitionSession: Send + Sync {
    fn push_frame(&self, frame: AudioFrame<'_>);

    /// Subscribe to the session's match events. Called once per session.
    fn events(&self) -> EventStream;
}
