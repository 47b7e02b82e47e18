// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Size in bytes of a single capture read; also handed to the backend as its minimum buffer.
    pub buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { buffer_size: 8192 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcoustidConfig {
    pub base_url: String,
    pub min_score: f32,
    /// Seconds of audio fingerprinted per lookup.
    pub window_secs: u32,
    pub timeout_secs: u64,
}

impl Default for AcoustidConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.acoustid.org/v2".to_string(),
            min_score: 0.5,
            window_secs: 12,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub credential: CredentialConfig,
    pub acoustid: AcoustidConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        let buffer_size = self.capture.buffer_size;
        if buffer_size == 0 || buffer_size % 2 != 0 {
            bail!("capture.buffer_size must be a positive multiple of 2 bytes, got {buffer_size}");
        }

        if !(0.0..=1.0).contains(&self.acoustid.min_score) {
            bail!(
                "acoustid.min_score must be between 0.0 and 1.0, got {}",
                self.acoustid.min_score
            );
        }

        if self.acoustid.window_secs == 0 {
            bail!("acoustid.window_secs must be > 0");
        }

        Ok(())
    }
}

/// Load configuration from defaults, an optional TOML file, then environment
/// overrides (prefix: EARSHOT_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("EARSHOT_").split("__"));

    let config: AppConfig = figment.extract()?;
    config.validate()?;
    info!(target: "config", buffer_size = config.capture.buffer_size, "configuration loaded");
    Ok(config)
}
