// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use crate::fingerprint::Fingerprint;
use crate::{AcoustidError, Result};

pub const ACOUSTID_API_BASE: &str = "https://api.acoustid.org/v2";
const USER_AGENT: &str = concat!("Earshot/", env!("CARGO_PKG_VERSION"));

/// A MusicBrainz recording matched by an AcoustID lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingMatch {
    /// MusicBrainz recording ID.
    pub id: Uuid,
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<RecordingArtist>,
    #[serde(default)]
    pub releases: Vec<ReleaseInfo>,
    /// Score (0-1) of the AcoustID track this recording was found under.
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingArtist {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseInfo {
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
}

/// AcoustID lookup client. The client key is the recognition credential.
#[derive(Debug, Clone)]
pub struct AcoustidClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AcoustidClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> AcoustidClientBuilder {
        AcoustidClientBuilder::new(api_key)
    }

    /// Every recording the service knows for `fingerprint`, unfiltered, in
    /// response order. A recording listed under several tracks keeps its
    /// best score.
    async fn lookup_raw(&self, fingerprint: &Fingerprint) -> Result<Vec<RecordingMatch>> {
        fingerprint.validate()?;

        let mut url = Url::parse(&format!("{}/lookup", self.base_url))
            .map_err(|e| AcoustidError::InvalidResponse(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("client", &self.api_key)
            .append_pair("fingerprint", &fingerprint.hash)
            .append_pair("duration", &fingerprint.duration.to_string())
            .append_pair("meta", "recordings releases");

        trace!(target: "acoustid", duration = fingerprint.duration, "AcoustID lookup");

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        debug!(target: "acoustid", %status, "AcoustID response");

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AcoustidError::Api(format!("HTTP {}: {}", status, message)));
        }

        let body = response.text().await?;
        trace!(target: "acoustid", body = %body, "AcoustID response body");

        let api_response: LookupResponse = serde_json::from_str(&body)?;

        if !api_response.status.eq_ignore_ascii_case("ok") {
            let message = api_response
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(AcoustidError::Api(message));
        }

        Ok(flatten_results(api_response.results))
    }

    /// Recordings scoring at least `min_score`, best first.
    pub async fn lookup(
        &self,
        fingerprint: &Fingerprint,
        min_score: f32,
    ) -> Result<Vec<RecordingMatch>> {
        check_min_score(min_score)?;

        let mut matches: Vec<RecordingMatch> = self
            .lookup_raw(fingerprint)
            .await?
            .into_iter()
            .filter(|m| m.score >= min_score)
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(matches)
    }
}

fn check_min_score(min_score: f32) -> Result<()> {
    if (0.0..=1.0).contains(&min_score) {
        Ok(())
    } else {
        Err(AcoustidError::Api(
            "Invalid parameter: min_score must be between 0.0 and 1.0".to_string(),
        ))
    }
}

fn flatten_results(results: Vec<TrackResult>) -> Vec<RecordingMatch> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut by_id: HashMap<Uuid, RecordingMatch> = HashMap::new();

    for track in results {
        for recording in track.recordings {
            match by_id.get_mut(&recording.id) {
                Some(existing) => {
                    if track.score > existing.score {
                        existing.score = track.score;
                    }
                }
                None => {
                    order.push(recording.id);
                    by_id.insert(
                        recording.id,
                        RecordingMatch {
                            id: recording.id,
                            title: recording.title,
                            artists: recording.artists,
                            releases: recording.releases,
                            score: track.score,
                        },
                    );
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    results: Vec<TrackResult>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TrackResult {
    score: f32,
    #[serde(default)]
    recordings: Vec<RecordingEntry>,
}

#[derive(Debug, Deserialize)]
struct RecordingEntry {
    id: Uuid,
    title: Option<String>,
    #[serde(default)]
    artists: Vec<RecordingArtist>,
    #[serde(default)]
    releases: Vec<ReleaseInfo>,
}

#[derive(Debug)]
pub struct AcoustidClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl AcoustidClientBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ACOUSTID_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// # Errors
    /// Fails if the base URL does not parse or the HTTP client cannot be built.
    pub fn build(self) -> Result<AcoustidClient> {
        Url::parse(&self.base_url)
            .map_err(|e| AcoustidError::Api(format!("Invalid base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(AcoustidClient {
            client,
            base_url: self.base_url,
            api_key: self.api_key,
        })
    }
}
