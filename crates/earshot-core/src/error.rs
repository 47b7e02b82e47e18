// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

use crate::item::MatchedItem;

pub type Result<T> = std::result::Result<T, RecognitionError>;

/// What a settled listening request resolves to.
pub type Outcome = Result<Vec<MatchedItem>>;

/// Every way a listening request can end other than with matched items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("Microphone access has not been granted")]
    PermissionDenied,

    #[error("No recognition credential is configured")]
    TokenMissing,

    #[error("Search is already in progress. Please cancel current search and try again")]
    AlreadyInProgress,

    #[error("Failed to create recognition session: {0}")]
    SessionCreationFailed(String),

    #[error("Audio capture failed: {0}")]
    DeviceError(String),

    #[error("No match found")]
    NoMatch,

    #[error("Recognition backend error: {0}")]
    Backend(String),

    #[error("Listening was stopped before a result arrived")]
    Cancelled,
}

impl RecognitionError {
    /// Stable code for callers on the other side of a language bridge.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::TokenMissing => "TOKEN_MISSING",
            Self::AlreadyInProgress => "SEARCH_IN_PROGRESS",
            Self::SessionCreationFailed(_) => "SESSION_ERROR",
            Self::DeviceError(_) => "DEVICE_ERROR",
            Self::NoMatch => "NO_MATCH",
            Self::Backend(_) => "MATCH_RESULT_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// `NoMatch` is an ordinary search result rather than a fault.
    pub fn is_fault(&self) -> bool {
        !matches!(self, Self::NoMatch | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            RecognitionError::PermissionDenied,
            RecognitionError::TokenMissing,
            RecognitionError::AlreadyInProgress,
            RecognitionError::SessionCreationFailed("x".into()),
            RecognitionError::DeviceError("x".into()),
            RecognitionError::NoMatch,
            RecognitionError::Backend("x".into()),
            RecognitionError::Cancelled,
        ];
        let mut codes: Vec<_> = all.iter().map(RecognitionError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn no_match_is_not_a_fault() {
        assert!(!RecognitionError::NoMatch.is_fault());
        assert!(RecognitionError::Backend("boom".into()).is_fault());
    }

    #[test]
    fn session_failure_carries_reason() {
        let err = RecognitionError::SessionCreationFailed("quota exceeded".into());
        assert_eq!(
            err.to_string(),
            "Failed to create recognition session: quota exceeded"
        );
    }
}
