//! In-memory backend and microphone used by the session lifecycle tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use earshot_core::{
    AudioFormat, AudioFrame, AudioInput, BackendError, CaptureError, CaptureStream, Credential,
    EventStream, MatchEvent, MediaItem, RecognitionBackend, RecognitionSession,
};
use futures_util::stream;
use tokio::sync::mpsc;

/// What the next created session should do.
#[derive(Clone)]
pub enum SessionPlan {
    /// Refuse to create the session.
    Refuse(String),
    /// Emit `events` once `after_frames` frames have been pushed.
    Emit {
        after_frames: usize,
        events: Vec<MatchEvent>,
    },
    /// Return an event stream that ends without yielding anything.
    EndStream,
    /// Panic inside `create_session`.
    Panic,
}

impl SessionPlan {
    pub fn emit(events: Vec<MatchEvent>) -> Self {
        Self::Emit {
            after_frames: 3,
            events,
        }
    }

    pub fn silent() -> Self {
        Self::Emit {
            after_frames: usize::MAX,
            events: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    plans: Mutex<VecDeque<SessionPlan>>,
    pub create_calls: AtomicUsize,
    pub credentials_seen: Mutex<Vec<String>>,
    pub formats_seen: Mutex<Vec<AudioFormat>>,
    pub sessions_dropped: Arc<AtomicUsize>,
    pub frames_pushed: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn with_plans(plans: impl IntoIterator<Item = SessionPlan>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecognitionBackend for FakeBackend {
    async fn create_session(
        &self,
        credential: &Credential,
        format: AudioFormat,
    ) -> Result<Box<dyn RecognitionSession>, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.credentials_seen
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        self.formats_seen.lock().unwrap().push(format);

        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(SessionPlan::silent);

        let (tx, rx) = mpsc::unbounded_channel();
        let (after_frames, pending, end_stream) = match plan {
            SessionPlan::Refuse(reason) => return Err(BackendError::new(reason)),
            SessionPlan::Panic => panic!("backend blew up while creating a session"),
            SessionPlan::Emit {
                after_frames,
                events,
            } => (after_frames, events, false),
            SessionPlan::EndStream => (usize::MAX, Vec::new(), true),
        };

        Ok(Box::new(FakeSession {
            frames: AtomicUsize::new(0),
            after_frames,
            pending: Mutex::new(Some(pending)),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            end_stream,
            dropped: self.sessions_dropped.clone(),
            total_frames: self.frames_pushed.clone(),
        }))
    }
}

pub struct FakeSession {
    frames: AtomicUsize,
    after_frames: usize,
    pending: Mutex<Option<Vec<MatchEvent>>>,
    tx: Mutex<Option<mpsc::UnboundedSender<MatchEvent>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<MatchEvent>>>,
    end_stream: bool,
    dropped: Arc<AtomicUsize>,
    total_frames: Arc<AtomicUsize>,
}

impl RecognitionSession for FakeSession {
    fn push_frame(&self, frame: AudioFrame<'_>) {
        assert!(!frame.bytes.is_empty());
        self.total_frames.fetch_add(1, Ordering::SeqCst);
        let seen = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        if seen < self.after_frames {
            return;
        }

        if let Some(events) = self.pending.lock().unwrap().take() {
            if let Some(tx) = self.tx.lock().unwrap().as_ref() {
                for event in events {
                    let _ = tx.send(event);
                }
            }
        }
    }

    fn events(&self) -> EventStream {
        if self.end_stream {
            return Box::pin(stream::empty::<MatchEvent>());
        }

        match self.rx.lock().unwrap().take() {
            Some(rx) => Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })),
            None => Box::pin(stream::empty::<MatchEvent>()),
        }
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Microphone double that counts opens and releases.
#[derive(Default)]
pub struct FakeMicrophone {
    pub opened: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    open_failures: Mutex<VecDeque<CaptureError>>,
    fail_reads_after: Mutex<Option<usize>>,
}

impl FakeMicrophone {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `open` fails with `err`.
    pub fn fail_next_open(&self, err: CaptureError) {
        self.open_failures.lock().unwrap().push_back(err);
    }

    /// Streams opened from now on fail after `reads` successful reads.
    pub fn fail_reads_after(&self, reads: usize) {
        *self.fail_reads_after.lock().unwrap() = Some(reads);
    }

    pub fn opens(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.opens() == self.releases()
    }
}

impl AudioInput for FakeMicrophone {
    fn open(&self, format: AudioFormat) -> Result<Box<dyn CaptureStream>, CaptureError> {
        assert_eq!(format.sample_rate, 48_000);
        if let Some(err) = self.open_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            reads: 0,
            fail_after: *self.fail_reads_after.lock().unwrap(),
            released: self.released.clone(),
        }))
    }
}

struct FakeStream {
    reads: usize,
    fail_after: Option<usize>,
    released: Arc<AtomicUsize>,
}

impl CaptureStream for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        thread::sleep(Duration::from_millis(2));
        if self.fail_after.is_some_and(|limit| self.reads >= limit) {
            return Err(CaptureError::Device("read failed".to_string()));
        }

        self.reads += 1;
        buf.fill(0);
        Ok(buf.len())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn song(title: &str, artist: &str) -> MediaItem {
    MediaItem {
        title: Some(title.to_string()),
        artist: Some(artist.to_string()),
        ..Default::default()
    }
}
