//! Main app runner for the record and devices commands

use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::application::ports::{CaptureDevice, ConfigStore, EncoderFactory};
use crate::application::{PhaseEvent, PhasedSession, SessionEvent, SessionOptions};
use crate::domain::config::AppConfig;
use crate::domain::recording::{Artifact, Duration};
use crate::domain::session::{CaptureState, Phase};
use crate::infrastructure::{
    CpalCaptureDevice, FlacEncoderFactory, PcmEncoderFactory, SyntheticCaptureDevice,
    XdgConfigStore,
};

use super::args::RecordArgs;
use super::presenter::Presenter;
use super::signals::Interrupts;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment override for the speaking time limit
pub const TIME_LIMIT_ENV: &str = "VIVA_RECORDER_TIME_LIMIT";

/// How often the level meter redraws
const METER_INTERVAL: StdDuration = StdDuration::from_millis(100);

/// Record one response and write it to disk
pub async fn run_record(args: RecordArgs) -> ExitCode {
    let mut presenter = Presenter::new();

    let time_limit = match parse_duration("time limit", args.time_limit.as_deref()) {
        Ok(d) => d,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };
    let preparation = match parse_duration("preparation", args.prep.as_deref()) {
        Ok(d) => d,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let cli_config = AppConfig {
        time_limit: time_limit.map(|d| d.to_string()),
        preparation: preparation.map(|d| d.to_string()),
        allow_re_record: args.allow_re_record(),
        ..Default::default()
    };
    let config = load_merged_config(cli_config).await;

    // File and env values are validated here; invalid ones are usage errors
    if let Err(e) = parse_duration("time limit", config.time_limit.as_deref())
        .and_then(|_| parse_duration("preparation", config.preparation.as_deref()))
    {
        presenter.error(&e);
        return ExitCode::from(EXIT_USAGE_ERROR);
    }

    let policy = config.policy();
    let mut options = SessionOptions::from_config(&config);
    options.constraints.device = args.device.clone();

    let device: Arc<dyn CaptureDevice> = if args.synthetic {
        Arc::new(SyntheticCaptureDevice::new())
    } else {
        Arc::new(CpalCaptureDevice::new())
    };
    let encoders: Arc<dyn EncoderFactory> = if args.raw {
        Arc::new(PcmEncoderFactory::new())
    } else {
        Arc::new(FlacEncoderFactory::new())
    };

    info!(
        "Recording with {} (deadline: {:?}, preparation: {:?})",
        device.name(),
        policy.effective_deadline().map(|d| d.to_string()),
        policy.preparation.map(|d| d.to_string())
    );

    let session = PhasedSession::new(policy, options, device, encoders);
    let mut interrupts = Interrupts::listen();

    let result = record_response(&session, &mut interrupts, &mut presenter).await;
    session.dispose().await;

    let artifact = match result {
        Ok(artifact) => artifact,
        Err(e) => {
            presenter.stop_spinner();
            presenter.error(&e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match write_artifact(&artifact, args.out, &config).await {
        Ok(path) => {
            presenter.output(&path.to_string_lossy());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// List audio input devices
pub fn run_devices() -> ExitCode {
    let presenter = Presenter::new();
    let names = CpalCaptureDevice::input_device_names();
    if names.is_empty() {
        presenter.warn("No audio input devices found");
        return ExitCode::from(EXIT_ERROR);
    }
    for name in names {
        presenter.output(&name);
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load_or_empty().await;

    let env_config = AppConfig {
        time_limit: env::var(TIME_LIMIT_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

fn parse_duration(what: &str, value: Option<&str>) -> Result<Option<Duration>, String> {
    value
        .map(|s| s.parse::<Duration>())
        .transpose()
        .map_err(|e| format!("Invalid {}: {}", what, e))
}

/// Run the question until a response is kept
async fn record_response(
    session: &PhasedSession,
    interrupts: &mut Interrupts,
    presenter: &mut Presenter,
) -> Result<Artifact, String> {
    loop {
        if session.phase() == Phase::Preparation {
            prepare(session, interrupts, presenter).await?;
        }

        let artifact = capture(session, interrupts, presenter).await?;

        if !session.snapshot().allow_re_record || !confirm_re_record(presenter).await {
            return Ok(artifact);
        }

        session.re_record();
        session
            .wait_until(|s| s.phase != Phase::Done && s.capture.state == CaptureState::Idle)
            .await
            .ok_or_else(|| "Session closed while resetting".to_string())?;
        presenter.info("Discarded; starting over");
    }
}

/// Show the preparation countdown until speaking begins.
/// Ctrl-C skips the rest of the countdown.
async fn prepare(
    session: &PhasedSession,
    interrupts: &mut Interrupts,
    presenter: &mut Presenter,
) -> Result<(), String> {
    let mut events = session.subscribe();
    session.begin_preparation_countdown();
    presenter.show_preparation(session.snapshot().preparation_remaining_secs);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PhaseEvent::PreparationRemaining(secs)) => presenter.update_preparation(secs),
                Ok(PhaseEvent::PhaseChanged(Phase::Speaking)) => break,
                Ok(PhaseEvent::PhaseChanged(phase)) => debug!("Phase changed to {}", phase),
                Ok(PhaseEvent::Disposed) | Err(RecvError::Closed) => {
                    return Err("Session closed during preparation".to_string())
                }
                Err(RecvError::Lagged(_)) => {
                    if session.phase() != Phase::Preparation {
                        break;
                    }
                }
            },
            _ = interrupts.next() => session.skip_preparation(),
        }
    }

    presenter.stop_spinner();
    Ok(())
}

/// Record one take. Ctrl-C stops the recording.
async fn capture(
    session: &PhasedSession,
    interrupts: &mut Interrupts,
    presenter: &mut Presenter,
) -> Result<Artifact, String> {
    let engine = session.engine();
    let mut events = engine.subscribe();
    let deadline = engine.snapshot().deadline.map(|d| d.as_secs());

    session.start();
    presenter.start_spinner("Waiting for microphone...");

    let mut meter = time::interval(METER_INTERVAL);
    let mut time_up = false;
    // Set once recorded; a deadline stop follows up with TimeUp before it
    let mut settle: Option<Instant> = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::StateChanged(CaptureState::Recorded)) => {
                    if deadline.is_none() {
                        break;
                    }
                    settle = Some(Instant::now() + METER_INTERVAL);
                }
                Ok(SessionEvent::TimeUp) => {
                    time_up = true;
                    break;
                }
                Ok(SessionEvent::StateChanged(CaptureState::Error)) => {
                    presenter.spinner_fail("Recording failed");
                    let reason = engine
                        .snapshot()
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "Recording failed".to_string());
                    return Err(reason);
                }
                Ok(SessionEvent::StateChanged(state)) => debug!("Capture state: {}", state),
                Ok(SessionEvent::Elapsed(_)) => {}
                Ok(SessionEvent::Disposed) | Err(RecvError::Closed) => {
                    return Err("Session closed during recording".to_string())
                }
                Err(RecvError::Lagged(_)) => match engine.state() {
                    CaptureState::Recorded => break,
                    CaptureState::Error => {
                        return Err("Recording failed".to_string())
                    }
                    _ => {}
                },
            },
            _ = time::sleep_until(settle.unwrap_or_else(Instant::now)), if settle.is_some() => {
                break;
            }
            _ = meter.tick() => {
                if engine.state() == CaptureState::Recording {
                    let level = engine.amplitude_tap().and_then(|tap| tap.level_db());
                    presenter.update_recording(engine.snapshot().elapsed_secs, deadline, level);
                }
            }
            _ = interrupts.next() => {
                if engine.state() != CaptureState::Recording {
                    return Err("Interrupted before recording started".to_string());
                }
                session.stop();
            }
        }
    }

    let artifact = engine
        .snapshot()
        .artifact
        .ok_or_else(|| "Recording finished without audio".to_string())?;

    presenter.spinner_success(&format!(
        "Recorded {}s ({})",
        artifact.recorded_secs(),
        artifact.human_readable_size()
    ));
    if time_up {
        presenter.warn("Time is up");
    }
    if artifact.size_bytes() == 0 {
        presenter.warn("No audio was captured");
    }
    Ok(artifact)
}

/// Ask whether to discard the take. Only asks on an interactive terminal.
async fn confirm_re_record(presenter: &Presenter) -> bool {
    if !std::io::stdin().is_terminal() {
        return false;
    }

    presenter.prompt("Keep this response? [Y/n] ");
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    if stdin.read_line(&mut line).await.is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "n" | "no")
}

async fn write_artifact(
    artifact: &Artifact,
    out: Option<PathBuf>,
    config: &AppConfig,
) -> Result<PathBuf, String> {
    let path = match out {
        Some(path) => path,
        None => {
            let id = artifact.reference().id().simple().to_string();
            let stem = format!("response-{}", &id[..8]);
            config.output_dir_or_default().join(artifact.file_name(&stem))
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    tokio::fs::write(&path, artifact.data())
        .await
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

    info!("Wrote {} to {}", artifact.reference(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::AudioMimeType;

    #[test]
    fn parse_duration_accepts_missing() {
        assert_eq!(parse_duration("time limit", None), Ok(None));
        assert_eq!(
            parse_duration("time limit", Some("2m")),
            Ok(Some(Duration::from_secs(120)))
        );
    }

    #[test]
    fn parse_duration_names_the_value() {
        let err = parse_duration("preparation", Some("later")).unwrap_err();
        assert!(err.starts_with("Invalid preparation"));
    }

    #[tokio::test]
    async fn write_artifact_uses_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            output_dir: Some(dir.path().join("answers").to_string_lossy().into_owned()),
            ..Default::default()
        };
        let artifact = Artifact::new(vec![1, 2, 3], AudioMimeType::Pcm, 3);

        let path = write_artifact(&artifact, None, &config).await.unwrap();
        assert!(path.starts_with(dir.path().join("answers")));
        assert_eq!(path.extension().unwrap(), "pcm");
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn write_artifact_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("q1.flac");
        let artifact = Artifact::new(vec![9], AudioMimeType::Flac, 1);

        let path = write_artifact(&artifact, Some(out.clone()), &AppConfig::empty())
            .await
            .unwrap();
        assert_eq!(path, out);
        assert!(out.exists());
    }
}
