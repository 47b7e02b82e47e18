// SPDX-License-Identifier: GPL-3.0-or-later

//! A WAV recording standing in for the microphone.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use earshot_core::{AudioFormat, AudioInput, CaptureError, CaptureStream};
use hound::{SampleFormat, WavIntoSamples, WavReader};
use tracing::debug;

/// Plays a 16-bit mono WAV file at the capture sample rate.
///
/// Reads are paced to real time so the backend sees audio arrive the way a
/// microphone would deliver it. Running out of file is a read failure.
pub struct WavFileInput {
    path: PathBuf,
    paced: bool,
}

impl WavFileInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            paced: true,
        }
    }

    /// Deliver samples as fast as they are read.
    #[cfg(test)]
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }
}

impl AudioInput for WavFileInput {
    fn is_available(&self) -> bool {
        self.path.is_file()
    }

    fn open(&self, format: AudioFormat) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let reader = WavReader::open(&self.path).map_err(|e| {
            CaptureError::Device(format!("cannot open {}: {e}", self.path.display()))
        })?;

        let spec = reader.spec();
        if spec.channels != 1
            || spec.sample_rate != format.sample_rate
            || spec.bits_per_sample != 16
            || spec.sample_format != SampleFormat::Int
        {
            return Err(CaptureError::Device(format!(
                "WAV is {} channel(s), {} Hz, {}-bit {:?}; need mono {} Hz 16-bit PCM",
                spec.channels,
                spec.sample_rate,
                spec.bits_per_sample,
                spec.sample_format,
                format.sample_rate
            )));
        }

        debug!(
            target: "capture",
            path = %self.path.display(),
            samples = reader.len(),
            "recording opened"
        );

        Ok(Box::new(WavStream {
            samples: reader.into_samples(),
            sample_rate: format.sample_rate,
            paced: self.paced,
            started: Instant::now(),
            delivered: 0,
            deferred: None,
        }))
    }
}

struct WavStream {
    samples: WavIntoSamples<BufReader<File>, i16>,
    sample_rate: u32,
    paced: bool,
    started: Instant,
    delivered: u64,
    /// Decode error hit after part of a buffer was filled, reported on the next read.
    deferred: Option<CaptureError>,
}

impl WavStream {
    fn wait_for_real_time(&self) {
        let due = Duration::from_secs_f64(self.delivered as f64 / f64::from(self.sample_rate));
        let elapsed = self.started.elapsed();
        if elapsed < due {
            thread::sleep(due - elapsed);
        }
    }
}

impl CaptureStream for WavStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }

        let mut written = 0;
        for slot in buf.chunks_exact_mut(2) {
            match self.samples.next() {
                Some(Ok(sample)) => {
                    slot.copy_from_slice(&sample.to_le_bytes());
                    written += 2;
                }
                Some(Err(e)) => {
                    let err = CaptureError::Device(e.to_string());
                    if written == 0 {
                        return Err(err);
                    }
                    self.deferred = Some(err);
                    break;
                }
                None => break,
            }
        }

        self.delivered += (written / 2) as u64;
        if self.paced && written > 0 {
            self.wait_for_real_time();
        }
        Ok(written)
    }
}
