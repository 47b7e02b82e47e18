// SPDX-License-Identifier: GPL-3.0-or-later

//! AcoustID recognition backend.
//!
//! This crate provides:
//! - An AcoustID lookup client with score filtering
//! - Fingerprint validation and the encoder seam (Chromaprint behind the
//!   `chromaprint` feature)
//! - A `RecognitionBackend` that fingerprints fixed windows of captured audio

pub mod backend;
pub mod client;
pub mod encoder;
pub mod error;
pub mod fingerprint;

pub use backend::{recording_to_item, AcoustidBackend, AcoustidSettings};
pub use client::{
    AcoustidClient, AcoustidClientBuilder, RecordingArtist, RecordingMatch, ReleaseInfo,
};
#[cfg(feature = "chromaprint")]
pub use encoder::ChromaprintEncoder;
pub use encoder::{clip_to_fingerprint_window, duration_secs, FingerprintEncoder};
pub use error::{AcoustidError, Result};
pub use fingerprint::Fingerprint;
