// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

/// A recognised media item as reported by a backend; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub recognition_id: Option<String>,
    pub catalog_id: Option<String>,
    pub isrc: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub artwork_url: Option<String>,
    pub web_url: Option<String>,
    pub video_url: Option<String>,
    pub store_url: Option<String>,
    pub explicit_content: Option<bool>,
    pub match_offset_ms: Option<f64>,
}

/// Result of a single recognition attempt, as delivered by the backend.
///
/// Whichever variant arrives first ends the request it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    Match(Vec<MediaItem>),
    NoMatch,
    Error(String),
}

/// Normalised recognition record handed back to callers.
///
/// URL fields are never absent: a missing URL is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedItem {
    pub recognition_id: Option<String>,
    pub catalog_id: Option<String>,
    pub isrc: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub subtitle: Option<String>,
    pub genres: Vec<String>,
    #[serde(rename = "artworkURL")]
    pub artwork_url: String,
    #[serde(rename = "webURL")]
    pub web_url: String,
    #[serde(rename = "videoURL")]
    pub video_url: String,
    #[serde(rename = "storeURL")]
    pub store_url: String,
    pub explicit_content: bool,
    /// Offset of the matched audio within the recording, in milliseconds.
    pub match_offset: f64,
}
