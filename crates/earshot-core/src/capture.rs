// SPDX-License-Identifier: GPL-3.0-or-later

//! Microphone capture on a dedicated worker thread.
//!
//! The engine opens the input synchronously, so device failures surface to the
//! caller of [`AudioCaptureEngine::start`]. Once running, the worker reads
//! fixed-size buffers and hands each one straight to the recognition session.
//! A failed read ends the loop; the owner learns about it through the exit
//! notification returned by `start`, never through a panic on the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::backend::{AudioFormat, AudioFrame, RecognitionSession};
use crate::error::RecognitionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("{0}")]
    Device(String),
}

impl From<CaptureError> for RecognitionError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied => RecognitionError::PermissionDenied,
            CaptureError::Device(message) => RecognitionError::DeviceError(message),
        }
    }
}

/// A capture device that can be opened in the fixed recognition format.
pub trait AudioInput: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn open(&self, format: AudioFormat) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// An open capture device. Dropping it releases the device.
pub trait CaptureStream: Send {
    /// Block until audio is available and copy it into `buf`.
    ///
    /// `Ok(0)` means the input has no more audio to give.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;
}

/// Why the capture loop exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureExit {
    Stopped,
    Failed(CaptureError),
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<CaptureExit>,
}

pub struct AudioCaptureEngine {
    input: Arc<dyn AudioInput>,
    format: AudioFormat,
    worker: Option<Worker>,
}

impl AudioCaptureEngine {
    pub fn new(input: Arc<dyn AudioInput>, format: AudioFormat) -> Self {
        Self {
            input,
            format,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Open the device and start streaming frames into `session`.
    ///
    /// The returned receiver fires once when the loop exits for any reason.
    pub fn start(
        &mut self,
        session: Arc<dyn RecognitionSession>,
    ) -> Result<oneshot::Receiver<CaptureExit>, CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::Device("capture is already running".to_string()));
        }

        let stream = self.input.open(self.format)?;
        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = oneshot::channel();
        let buffer_size = self.format.buffer_size;

        let worker_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let exit = capture_loop(stream, session, &worker_stop, buffer_size);
                let _ = exit_tx.send(exit.clone());
                exit
            })
            .map_err(|e| CaptureError::Device(format!("failed to spawn capture worker: {e}")))?;

        info!(
            target: "capture",
            buffer_size,
            sample_rate = self.format.sample_rate,
            "capture started"
        );
        self.worker = Some(Worker { stop, handle });
        Ok(exit_rx)
    }

    /// Stop the loop and block until the worker has exited and released the device.
    ///
    /// Returns `None` when nothing was running.
    pub fn stop(&mut self) -> Option<CaptureExit> {
        let worker = self.worker.take()?;
        worker.stop.store(true, Ordering::Release);

        let exit = worker.handle.join().unwrap_or_else(|_| {
            CaptureExit::Failed(CaptureError::Device("capture worker panicked".to_string()))
        });
        debug!(target: "capture", ?exit, "capture stopped");
        Some(exit)
    }
}

impl Drop for AudioCaptureEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    mut stream: Box<dyn CaptureStream>,
    session: Arc<dyn RecognitionSession>,
    stop: &AtomicBool,
    buffer_size: usize,
) -> CaptureExit {
    let mut buffer = vec![0u8; buffer_size];
    let started = Instant::now();
    let mut frames: u64 = 0;

    let exit = loop {
        if stop.load(Ordering::Acquire) {
            break CaptureExit::Stopped;
        }

        match stream.read(&mut buffer) {
            Ok(0) => {
                stop.store(true, Ordering::Release);
                break CaptureExit::Failed(CaptureError::Device(
                    "capture stream ended".to_string(),
                ));
            }
            Ok(read) => {
                let read = read.min(buffer.len());
                session.push_frame(AudioFrame {
                    bytes: &buffer[..read],
                    timestamp: started.elapsed(),
                });
                frames += 1;
            }
            // A device torn down underneath a requested stop is not a failure.
            Err(_) if stop.load(Ordering::Acquire) => break CaptureExit::Stopped,
            Err(err) => {
                stop.store(true, Ordering::Release);
                warn!(target: "capture", error = %err, "capture read failed");
                break CaptureExit::Failed(err);
            }
        }
    };

    drop(stream);
    debug!(target: "capture", frames, "capture loop exited, device released");
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EventStream;
    use crate::item::MatchEvent;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<(usize, Duration)>>,
    }

    impl RecognitionSession for Recorder {
        fn push_frame(&self, frame: AudioFrame<'_>) {
            self.frames
                .lock()
                .unwrap()
                .push((frame.bytes.len(), frame.timestamp));
        }

        fn events(&self) -> EventStream {
            Box::pin(futures_util::stream::pending::<MatchEvent>())
        }
    }

    struct ScriptedInput {
        reads: Mutex<Option<Vec<Result<usize, CaptureError>>>>,
        released: Arc<AtomicUsize>,
    }

    struct ScriptedStream {
        reads: std::vec::IntoIter<Result<usize, CaptureError>>,
        released: Arc<AtomicUsize>,
    }

    impl AudioInput for ScriptedInput {
        fn open(&self, _format: AudioFormat) -> Result<Box<dyn CaptureStream>, CaptureError> {
            let reads = self
                .reads
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| CaptureError::Device("busy".into()))?;
            Ok(Box::new(ScriptedStream {
                reads: reads.into_iter(),
                released: self.released.clone(),
            }))
        }
    }

    impl CaptureStream for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
            thread::sleep(Duration::from_millis(1));
            match self.reads.next() {
                Some(read) => read.map(|n| n.min(buf.len())),
                None => Ok(buf.len()),
            }
        }
    }

    impl Drop for ScriptedStream {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn engine(reads: Vec<Result<usize, CaptureError>>) -> (AudioCaptureEngine, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let input = ScriptedInput {
            reads: Mutex::new(Some(reads)),
            released: released.clone(),
        };
        let engine = AudioCaptureEngine::new(Arc::new(input), AudioFormat::with_buffer_size(64));
        (engine, released)
    }

    #[tokio::test]
    async fn read_failure_ends_loop_and_releases_device() {
        let (mut engine, released) = engine(vec![
            Ok(64),
            Ok(32),
            Err(CaptureError::Device("unplugged".into())),
        ]);
        let recorder = Arc::new(Recorder::default());

        let exit_rx = engine.start(recorder.clone()).expect("start");
        let exit = exit_rx.await.expect("exit notification");

        assert_eq!(exit, CaptureExit::Failed(CaptureError::Device("unplugged".into())));
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let frames = recorder.frames.lock().unwrap().clone();
        assert_eq!(frames.iter().map(|f| f.0).collect::<Vec<_>>(), vec![64, 32]);
        assert!(frames[0].1 <= frames[1].1);

        assert!(engine.is_running());
        assert_eq!(engine.stop(), Some(exit));
        assert!(!engine.is_running());
    }

    #[test]
    fn stop_blocks_until_worker_exits() {
        let (mut engine, released) = engine(Vec::new());
        let recorder = Arc::new(Recorder::default());

        engine.start(recorder.clone()).expect("start");
        let deadline = Instant::now() + Duration::from_secs(2);
        while recorder.frames.lock().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(engine.stop(), Some(CaptureExit::Stopped));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!recorder.frames.lock().unwrap().is_empty());

        assert_eq!(engine.stop(), None);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_failure_is_reported_synchronously() {
        let (mut engine, _released) = engine(Vec::new());
        engine.start(Arc::new(Recorder::default())).expect("first start");
        engine.stop();

        let err = engine.start(Arc::new(Recorder::default())).unwrap_err();
        assert_eq!(err, CaptureError::Device("busy".into()));
        assert!(!engine.is_running());
    }

    #[test]
    fn end_of_input_is_a_device_failure() {
        let (mut engine, released) = engine(vec![Ok(0)]);
        let exit_rx = engine.start(Arc::new(Recorder::default())).expect("start");
        let exit = exit_rx.blocking_recv().expect("exit notification");

        assert_eq!(
            exit,
            CaptureExit::Failed(CaptureError::Device("capture stream ended".into()))
        );
        assert_eq!(engine.stop(), Some(exit));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn permission_denied_maps_to_recognition_error() {
        assert_eq!(
            RecognitionError::from(CaptureError::PermissionDenied),
            RecognitionError::PermissionDenied
        );
    }
}
