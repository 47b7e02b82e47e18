// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::{AcoustidError, Result};

/// Compressed Chromaprint fingerprint of a window of captured audio.
///
/// Chromaprint encodes its compressed fingerprint with the URL-safe base64
/// alphabet and no padding, which is also what the AcoustID lookup expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    /// Seconds of audio the fingerprint covers.
    pub duration: u32,
}

impl Fingerprint {
    pub fn new(hash: impl Into<String>, duration: u32) -> Self {
        Self {
            hash: hash.into(),
            duration,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hash.is_empty() {
            return Err(AcoustidError::InvalidFingerprint(
                "fingerprint hash is empty".to_string(),
            ));
        }

        if self.duration == 0 {
            return Err(AcoustidError::InvalidFingerprint(
                "duration must be > 0".to_string(),
            ));
        }

        if let Some(bad) = self
            .hash
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(AcoustidError::InvalidFingerprint(format!(
                "unexpected character {bad:?} in fingerprint"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_safe_fingerprint_is_valid() {
        assert!(Fingerprint::new("AQADtEmSREkk-_xR", 12).validate().is_ok());
    }

    #[test]
    fn empty_hash_is_invalid() {
        assert!(Fingerprint::new("", 12).validate().is_err());
    }

    #[test]
    fn zero_duration_is_invalid() {
        assert!(Fingerprint::new("AQADtEmSREkk", 0).validate().is_err());
    }

    #[test]
    fn standard_base64_symbols_are_rejected() {
        let err = Fingerprint::new("AQAD+/tE==", 12).validate().unwrap_err();
        assert!(err.to_string().contains("'+'"), "unexpected error: {err}");
    }
}
