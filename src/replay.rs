//! Replay harness
//!
//! Drives a full gesture session without a camera: a synthetic source fed at
//! the configured frame rate and an estimator replaying a pose timeline.

use crate::capture::SyntheticProvider;
use crate::export::DirectoryExporter;
use crate::pose::{available_models, PoseScript, ScriptedLoader};
use crate::recorder::{RecordingEvent, RecordingState, SessionController};
use crate::settings::{read_settings, AppSettings};
use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable pointing at a settings file
pub const SETTINGS_ENV: &str = "STASIS_SETTINGS";

/// Extra time allowed beyond the script for finalizing
const SETTLE_GRACE: Duration = Duration::from_secs(5);

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayArgs {
    pub script: PathBuf,
    pub output_dir: PathBuf,
}

impl ReplayArgs {
    /// Parse `<script.json> [output_dir]` (program name already stripped)
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut args = args.into_iter();
        let Some(script) = args.next() else {
            bail!("usage: stasis <script.json> [output_dir]");
        };
        let output_dir = args.next().unwrap_or_else(|| ".".to_string());
        if let Some(extra) = args.next() {
            bail!("unexpected argument '{}'", extra);
        }
        Ok(Self {
            script: PathBuf::from(script),
            output_dir: PathBuf::from(output_dir),
        })
    }
}

/// What a replay ended with
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    Exported(crate::export::ExportReceipt),
    /// The script never completed a start/stop cycle
    NoRecording(RecordingState),
}

pub fn load_script(path: &Path) -> anyhow::Result<PoseScript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pose script {:?}", path))?;
    let script: PoseScript =
        serde_json::from_str(&content).with_context(|| format!("Invalid pose script {:?}", path))?;
    if script.steps.is_empty() {
        bail!("pose script {:?} has no steps", path);
    }
    Ok(script)
}

pub fn load_settings() -> anyhow::Result<AppSettings> {
    match std::env::var_os(SETTINGS_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            read_settings(&path).with_context(|| format!("Failed to load settings from {:?}", path))
        }
        None => Ok(AppSettings::default()),
    }
}

/// Run one scripted session and export whatever it produced
pub async fn replay(
    settings: &AppSettings,
    script: PoseScript,
    output_dir: &Path,
) -> anyhow::Result<ReplayOutcome> {
    let installed = available_models(&settings.ai.models_dir);
    if !installed.contains(&settings.ai.model) {
        tracing::warn!(
            "Model '{}' not found in {:?}, replay uses the scripted estimator anyway",
            settings.ai.model.as_str(),
            settings.ai.models_dir
        );
    }

    let deadline = Duration::from_millis(script.total_duration_ms()) + SETTLE_GRACE;
    let controller = SessionController::new(
        settings.trigger_config(),
        Arc::new(ScriptedLoader::new(script)),
        Arc::new(SyntheticProvider::feeding()),
    );
    let mut events = controller.subscribe();

    controller.arm(settings.ai.model).await.context("Failed to arm session")?;
    tracing::info!("Armed, replaying {:?} of poses", deadline - SETTLE_GRACE);

    let settled = tokio::time::timeout(deadline, async {
        loop {
            match events.recv().await {
                Ok(RecordingEvent::StateChanged { to, .. })
                    if matches!(to, RecordingState::Review | RecordingState::Idle) =>
                {
                    return to;
                }
                Ok(RecordingEvent::Error(error)) => {
                    tracing::error!("[{}] {}", error.code, error.message);
                }
                Ok(event) => tracing::debug!("{:?}", event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} recorder events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return controller.state(),
            }
        }
    })
    .await;

    match settled {
        Ok(RecordingState::Review) => {
            let receipt = controller
                .export(&DirectoryExporter::creating(output_dir))
                .await
                .context("Failed to export recording")?;
            Ok(ReplayOutcome::Exported(receipt))
        }
        Ok(state) => Ok(ReplayOutcome::NoRecording(state)),
        Err(_) => {
            let state = controller.state();
            controller.force_stop();
            Ok(ReplayOutcome::NoRecording(state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{ScriptStep, ScriptedPose};
    use tempfile::tempdir;

    fn steps(steps: &[(ScriptedPose, u64)]) -> PoseScript {
        PoseScript::new(
            steps
                .iter()
                .map(|&(pose, duration_ms)| ScriptStep { pose, duration_ms })
                .collect(),
        )
    }

    #[test]
    fn test_parse_args() {
        let args = ReplayArgs::parse(["poses.json".to_string()]).unwrap();
        assert_eq!(args.output_dir, PathBuf::from("."));

        let args = ReplayArgs::parse(["poses.json".to_string(), "out".to_string()]).unwrap();
        assert_eq!(args.output_dir, PathBuf::from("out"));

        assert!(ReplayArgs::parse(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_load_script_accepts_snake_case_durations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("poses.json");
        std::fs::write(
            &path,
            r#"[{ "pose": "start", "duration_ms": 800 }, { "pose": "stop", "durationMs": 600 }]"#,
        )
        .unwrap();

        let script = load_script(&path).unwrap();
        assert_eq!(script.total_duration_ms(), 1400);
        assert_eq!(script.steps[1].pose, ScriptedPose::Stop);

        std::fs::write(&path, "[]").unwrap();
        assert!(load_script(&path).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_exports_recording() {
        let dir = tempdir().unwrap();
        let script = steps(&[
            (ScriptedPose::Neutral, 300),
            (ScriptedPose::Start, 800),
            (ScriptedPose::Neutral, 300),
            (ScriptedPose::Stop, 800),
        ]);

        let outcome = replay(&AppSettings::default(), script, dir.path()).await.unwrap();
        let ReplayOutcome::Exported(receipt) = outcome else {
            panic!("expected an export, got {:?}", outcome);
        };
        assert!(receipt.path.starts_with(dir.path()));
        assert!(receipt.bytes > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_without_gesture_times_out() {
        let dir = tempdir().unwrap();
        let script = steps(&[(ScriptedPose::Neutral, 1000)]);

        let outcome = replay(&AppSettings::default(), script, dir.path()).await.unwrap();
        assert_eq!(outcome, ReplayOutcome::NoRecording(RecordingState::Armed));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
