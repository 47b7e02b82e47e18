// SPDX-License-Identifier: GPL-3.0-or-later

//! Translation of backend match events into caller-facing outcomes.

use crate::error::{Outcome, RecognitionError};
use crate::item::{MatchEvent, MatchedItem, MediaItem};

impl From<MediaItem> for MatchedItem {
    fn from(item: MediaItem) -> Self {
        Self {
            recognition_id: item.recognition_id,
            catalog_id: item.catalog_id,
            isrc: item.isrc,
            title: item.title,
            artist: item.artist,
            subtitle: item.subtitle,
            genres: item.genres,
            artwork_url: item.artwork_url.unwrap_or_default(),
            web_url: item.web_url.unwrap_or_default(),
            video_url: item.video_url.unwrap_or_default(),
            store_url: item.store_url.unwrap_or_default(),
            explicit_content: item.explicit_content.unwrap_or(false),
            match_offset: item
                .match_offset_ms
                .filter(|offset| offset.is_finite())
                .unwrap_or(0.0),
        }
    }
}

/// Map the terminal event of a session to the outcome that settles its request.
///
/// An empty `Match` stays a success with no items so callers can tell it apart
/// from `NoMatch`.
pub fn map_event(event: MatchEvent) -> Outcome {
    match event {
        MatchEvent::Match(items) => Ok(items.into_iter().map(MatchedItem::from).collect()),
        MatchEvent::NoMatch => Err(RecognitionError::NoMatch),
        MatchEvent::Error(cause) => Err(RecognitionError::Backend(cause)),
    }
}
