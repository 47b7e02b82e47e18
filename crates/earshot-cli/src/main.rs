// SPDX-License-Identifier: GPL-3.0-or-later

mod wav;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use earshot_acoustid::{AcoustidBackend, AcoustidSettings, FingerprintEncoder};
use earshot_config::{load as load_config, AppConfig};
use earshot_core::{RecognitionError, Recognizer, StaticTokenProvider};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::wav::WavFileInput;

const USAGE: &str = "usage: earshot [CONFIG.toml] <recording.wav>";

#[derive(Debug, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    recording: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config.telemetry.log_level);

    let input = Arc::new(WavFileInput::new(&args.recording));
    let recognizer = build_recognizer(&config, input)?;
    if !recognizer.is_available() {
        bail!("recording {} not found", args.recording.display());
    }

    info!(
        target: "cli",
        recording = %args.recording.display(),
        "listening"
    );

    let request = recognizer.start_listening();
    tokio::pin!(request);

    let outcome = tokio::select! {
        outcome = &mut request => outcome,
        _ = shutdown_signal() => {
            recognizer.stop_listening().await;
            request.await
        }
    };

    match outcome {
        Ok(items) => {
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(RecognitionError::NoMatch) => {
            eprintln!("no match found");
            Ok(ExitCode::from(1))
        }
        Err(RecognitionError::Cancelled) => {
            warn!(target: "cli", "recognition stopped before a result");
            Ok(ExitCode::from(130))
        }
        Err(err) => bail!("{}: {}", err.code(), err),
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let args: Vec<String> = args.into_iter().collect();
    match args.as_slice() {
        [recording] => Ok(CliArgs {
            config: None,
            recording: PathBuf::from(recording),
        }),
        [config, recording] => Ok(CliArgs {
            config: Some(PathBuf::from(config)),
            recording: PathBuf::from(recording),
        }),
        _ => bail!(USAGE),
    }
}

fn build_recognizer(config: &AppConfig, input: Arc<WavFileInput>) -> Result<Recognizer> {
    let settings = AcoustidSettings {
        base_url: config.acoustid.base_url.clone(),
        min_score: config.acoustid.min_score,
        window_secs: config.acoustid.window_secs,
        timeout: Duration::from_secs(config.acoustid.timeout_secs),
    };
    let backend = Arc::new(AcoustidBackend::new(settings, fingerprint_encoder()?));
    let tokens = Arc::new(StaticTokenProvider::new(config.credential.token.clone()));

    Ok(Recognizer::builder(backend, input)
        .buffer_size(config.capture.buffer_size)
        .token_provider(tokens)
        .build())
}

#[cfg(feature = "chromaprint")]
fn fingerprint_encoder() -> Result<Arc<dyn FingerprintEncoder>> {
    Ok(Arc::new(earshot_acoustid::ChromaprintEncoder::new()))
}

#[cfg(not(feature = "chromaprint"))]
fn fingerprint_encoder() -> Result<Arc<dyn FingerprintEncoder>> {
    bail!("earshot was built without fingerprinting; rebuild with `--features chromaprint`")
}

fn init_tracing(default_level: &str) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => {},
                    _ = terminate.recv() => {},
                }
            }
            _ => {
                warn!(target: "cli", "signal handlers unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!(target: "cli", "shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<CliArgs> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn recording_only() {
        let parsed = args(&["clip.wav"]).unwrap();
        assert_eq!(parsed.config, None);
        assert_eq!(parsed.recording, PathBuf::from("clip.wav"));
    }

    #[test]
    fn config_then_recording() {
        let parsed = args(&["earshot.toml", "clip.wav"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("earshot.toml")));
        assert_eq!(parsed.recording, PathBuf::from("clip.wav"));
    }

    #[test]
    fn wrong_arity_prints_usage() {
        for list in [&[][..], &["a", "b", "c"][..]] {
            let err = args(list).unwrap_err();
            assert_eq!(err.to_string(), USAGE);
        }
    }

    #[cfg(not(feature = "chromaprint"))]
    #[test]
    fn recognizer_needs_fingerprinting() {
        let config = AppConfig::default();
        let input = Arc::new(WavFileInput::new("clip.wav"));

        let err = build_recognizer(&config, input).err().unwrap();
        assert!(err.to_string().contains("--features chromaprint"));
    }

    #[cfg(unix)]
    #[test]
    fn unix_signal_kinds_available() {
        use tokio::signal::unix::SignalKind;
        let _ = SignalKind::interrupt();
        let _ = SignalKind::terminate();
    }
}
