// SPDX-License-Identifier: GPL-3.0-or-later

//! `RecognitionBackend` on top of AcoustID lookups.
//!
//! Pushed PCM is cut into fixed windows. Each window is fingerprinted and
//! looked up once the session's event stream is polled, so nothing reaches
//! the network until the controller starts listening.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use earshot_core::{
    AudioFormat, AudioFrame, BackendError, Credential, EventStream, MatchEvent, MediaItem,
    RecognitionBackend, RecognitionSession, SAMPLE_RATE_HZ,
};
use futures_util::stream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::client::{AcoustidClient, RecordingMatch, ACOUSTID_API_BASE};
use crate::encoder::FingerprintEncoder;

const MUSICBRAINZ_RECORDING_URL: &str = "https://musicbrainz.org/recording/";

#[derive(Debug, Clone, PartialEq)]
pub struct AcoustidSettings {
    pub base_url: String,
    pub min_score: f32,
    /// Seconds of audio per lookup.
    pub window_secs: u32,
    pub timeout: Duration,
}

impl Default for AcoustidSettings {
    fn default() -> Self {
        Self {
            base_url: ACOUSTID_API_BASE.to_string(),
            min_score: 0.5,
            window_secs: 12,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct AcoustidBackend {
    settings: AcoustidSettings,
    encoder: Arc<dyn FingerprintEncoder>,
}

impl AcoustidBackend {
    pub fn new(settings: AcoustidSettings, encoder: Arc<dyn FingerprintEncoder>) -> Self {
        Self { settings, encoder }
    }

    pub fn settings(&self) -> &AcoustidSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl RecognitionBackend for AcoustidBackend {
    async fn create_session(
        &self,
        credential: &Credential,
        format: AudioFormat,
    ) -> Result<Box<dyn RecognitionSession>, BackendError> {
        if format.sample_rate != SAMPLE_RATE_HZ {
            return Err(BackendError::new(format!(
                "unsupported sample rate {} Hz, expected {} Hz",
                format.sample_rate, SAMPLE_RATE_HZ
            )));
        }
        if credential.expose().trim().is_empty() {
            return Err(BackendError::new("AcoustID client key is empty"));
        }
        if self.settings.window_secs == 0 {
            return Err(BackendError::new("lookup window must be at least one second"));
        }

        let client = AcoustidClient::builder(credential.expose())
            .base_url(self.settings.base_url.clone())
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| BackendError::new(e.to_string()))?;

        let window_len = format.sample_rate as usize * self.settings.window_secs as usize;
        let (windows_tx, windows_rx) = mpsc::unbounded_channel();

        info!(
            target: "acoustid",
            window_secs = self.settings.window_secs,
            min_score = self.settings.min_score,
            "recognition session created"
        );

        Ok(Box::new(AcoustidSession {
            buffer: Mutex::new(WindowBuffer::new(window_len)),
            windows_tx,
            lookup: Mutex::new(Some(Lookup {
                windows: windows_rx,
                client,
                encoder: self.encoder.clone(),
                min_score: self.settings.min_score,
                sample_rate: format.sample_rate,
            })),
        }))
    }
}

struct AcoustidSession {
    buffer: Mutex<WindowBuffer>,
    windows_tx: mpsc::UnboundedSender<Vec<i16>>,
    lookup: Mutex<Option<Lookup>>,
}

impl RecognitionSession for AcoustidSession {
    fn push_frame(&self, frame: AudioFrame<'_>) {
        let windows = self
            .buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.bytes);

        for window in windows {
            trace!(
                target: "acoustid",
                samples = window.len(),
                at = ?frame.timestamp,
                "window complete"
            );
            // Nobody listening yet or any more; the window is simply dropped.
            let _ = self.windows_tx.send(window);
        }
    }

    fn events(&self) -> EventStream {
        let lookup = self.lookup.lock().unwrap_or_else(|e| e.into_inner()).take();
        match lookup {
            Some(lookup) => Box::pin(stream::unfold(lookup, |mut lookup| async move {
                let window = lookup.windows.recv().await?;
                let event = lookup.recognize(window).await;
                Some((event, lookup))
            })),
            None => {
                warn!(target: "acoustid", "event stream requested twice");
                Box::pin(stream::empty::<MatchEvent>())
            }
        }
    }
}

struct Lookup {
    windows: mpsc::UnboundedReceiver<Vec<i16>>,
    client: AcoustidClient,
    encoder: Arc<dyn FingerprintEncoder>,
    min_score: f32,
    sample_rate: u32,
}

impl Lookup {
    async fn recognize(&self, window: Vec<i16>) -> MatchEvent {
        let encoder = self.encoder.clone();
        let sample_rate = self.sample_rate;
        let encoded =
            tokio::task::spawn_blocking(move || encoder.encode(&window, sample_rate)).await;

        let fingerprint = match encoded {
            Ok(Ok(fingerprint)) => fingerprint,
            Ok(Err(err)) => return MatchEvent::Error(err.to_string()),
            Err(err) => return MatchEvent::Error(format!("fingerprint task failed: {err}")),
        };

        match self.client.lookup(&fingerprint, self.min_score).await {
            Ok(matches) if matches.is_empty() => {
                debug!(target: "acoustid", "no recording above the score threshold");
                MatchEvent::NoMatch
            }
            Ok(matches) => {
                debug!(target: "acoustid", count = matches.len(), "recordings matched");
                MatchEvent::Match(matches.into_iter().map(recording_to_item).collect())
            }
            Err(err) => {
                warn!(target: "acoustid", error = %err, "lookup failed");
                MatchEvent::Error(err.to_string())
            }
        }
    }
}

/// Describe a matched recording the way the rest of the pipeline expects.
pub fn recording_to_item(recording: RecordingMatch) -> MediaItem {
    let artist = if recording.artists.is_empty() {
        None
    } else {
        Some(
            recording
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    };

    MediaItem {
        recognition_id: Some(recording.id.to_string()),
        title: recording.title,
        artist,
        subtitle: recording.releases.into_iter().find_map(|r| r.title),
        web_url: Some(format!("{MUSICBRAINZ_RECORDING_URL}{}", recording.id)),
        ..Default::default()
    }
}

/// Little-endian byte stream to fixed-length sample windows. A frame may end
/// mid-sample; the odd byte is carried into the next frame.
struct WindowBuffer {
    window_len: usize,
    samples: Vec<i16>,
    carry: Option<u8>,
}

impl WindowBuffer {
    fn new(window_len: usize) -> Self {
        Self {
            window_len: window_len.max(1),
            samples: Vec::new(),
            carry: None,
        }
    }

    fn push(&mut self, mut bytes: &[u8]) -> Vec<Vec<i16>> {
        if let Some(low) = self.carry.take() {
            match bytes.split_first() {
                Some((&high, rest)) => {
                    self.samples.push(i16::from_le_bytes([low, high]));
                    bytes = rest;
                }
                None => self.carry = Some(low),
            }
        }

        let mut pairs = bytes.chunks_exact(2);
        self.samples
            .extend(pairs.by_ref().map(|p| i16::from_le_bytes([p[0], p[1]])));
        if let Some(&odd) = pairs.remainder().first() {
            self.carry = Some(odd);
        }

        let mut complete = Vec::new();
        while self.samples.len() >= self.window_len {
            let rest = self.samples.split_off(self.window_len);
            complete.push(std::mem::replace(&mut self.samples, rest));
        }
        complete
    }
}
