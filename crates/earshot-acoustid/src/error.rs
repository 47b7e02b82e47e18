// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AcoustidError>;

#[derive(Debug, Error)]
pub enum AcoustidError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("AcoustID API error: {0}")]
    Api(String),

    #[error("Invalid response from AcoustID API: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
