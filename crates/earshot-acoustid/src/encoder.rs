// SPDX-License-Identifier: GPL-3.0-or-later

//! Turning captured PCM into Chromaprint fingerprints.

use tracing::debug;

use crate::{Fingerprint, Result};

/// Longest stretch of audio worth fingerprinting. AcoustID only compares the
/// first two minutes of a track.
pub const MAX_FINGERPRINT_SECS: u32 = 120;

/// Produces a fingerprint for mono 16-bit PCM.
///
/// Encoding is CPU bound; the session calls it from a blocking task.
pub trait FingerprintEncoder: Send + Sync + 'static {
    fn encode(&self, samples: &[i16], sample_rate: u32) -> Result<Fingerprint>;
}

/// Cut `samples` down to the fingerprint limit.
pub fn clip_to_fingerprint_window(samples: &[i16], sample_rate: u32) -> &[i16] {
    let max_samples = sample_rate.max(1) as usize * MAX_FINGERPRINT_SECS as usize;
    if samples.len() > max_samples {
        debug!(
            target: "acoustid",
            original_len = samples.len(),
            max_samples,
            "clipping samples to the fingerprint limit"
        );
        &samples[..max_samples]
    } else {
        samples
    }
}

/// Whole seconds covered by `sample_count` samples, at least one for any
/// non-empty input.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> u32 {
    if sample_count == 0 {
        return 0;
    }
    ((sample_count / sample_rate.max(1) as usize) as u32).max(1)
}

#[cfg(feature = "chromaprint")]
pub use self::chromaprint_encoder::ChromaprintEncoder;

#[cfg(feature = "chromaprint")]
mod chromaprint_encoder {
    use chromaprint::Chromaprint;

    use super::{clip_to_fingerprint_window, duration_secs, FingerprintEncoder};
    use crate::{AcoustidError, Fingerprint, Result};

    /// Encoder backed by the native libchromaprint.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ChromaprintEncoder;

    impl ChromaprintEncoder {
        pub fn new() -> Self {
            Self
        }
    }

    impl FingerprintEncoder for ChromaprintEncoder {
        fn encode(&self, samples: &[i16], sample_rate: u32) -> Result<Fingerprint> {
            if samples.is_empty() {
                return Err(AcoustidError::AudioProcessing(
                    "No audio samples available".to_string(),
                ));
            }

            let samples = clip_to_fingerprint_window(samples, sample_rate);
            let mut ctx = Chromaprint::new();

            if !ctx.start(sample_rate as i32, 1) {
                return Err(AcoustidError::AudioProcessing(
                    "Failed to start Chromaprint".to_string(),
                ));
            }

            if !ctx.feed(samples) {
                return Err(AcoustidError::AudioProcessing(
                    "Failed to feed samples to Chromaprint".to_string(),
                ));
            }

            if !ctx.finish() {
                return Err(AcoustidError::AudioProcessing(
                    "Chromaprint finalize failed".to_string(),
                ));
            }

            let hash = ctx.fingerprint().ok_or_else(|| {
                AcoustidError::AudioProcessing(
                    "Chromaprint did not return a fingerprint".to_string(),
                )
            })?;

            Ok(Fingerprint::new(hash, duration_secs(samples.len(), sample_rate)))
        }
    }
}
