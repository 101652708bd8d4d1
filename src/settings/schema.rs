//! Settings schema
//!
//! Every section falls back to its defaults, so partial files are valid.

use crate::capture::{VideoConstraints, DEFAULT_PREFERRED_MIME_TYPE};
use crate::pose::classifier::{DEFAULT_ALIGNMENT_RATIO, DEFAULT_PROXIMITY_RATIO};
use crate::pose::ModelVariant;
use crate::recorder::TriggerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        let constraints = VideoConstraints::default();
        Self {
            frame_rate: constraints.frame_rate,
            width: constraints.width,
            height: constraints.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingSettings {
    /// Codec tried first; an empty value uses the source default
    pub preferred_mime_type: String,
    pub hold_duration_ms: u64,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            preferred_mime_type: DEFAULT_PREFERRED_MIME_TYPE.to_string(),
            hold_duration_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub frame_interval_ms: u64,
    pub proximity_ratio: f32,
    pub alignment_ratio: f32,
    pub model: ModelVariant,
    pub models_dir: PathBuf,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            proximity_ratio: DEFAULT_PROXIMITY_RATIO,
            alignment_ratio: DEFAULT_ALIGNMENT_RATIO,
            model: ModelVariant::Lite,
            models_dir: PathBuf::from("models"),
        }
    }
}

// =============================================================================
// Root
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub video: VideoSettings,
    pub recording: RecordingSettings,
    pub ai: AiSettings,
}

impl AppSettings {
    /// Configuration injected into the recorder
    pub fn trigger_config(&self) -> TriggerConfig {
        let preferred = self.recording.preferred_mime_type.trim();
        TriggerConfig {
            proximity_ratio: self.ai.proximity_ratio,
            alignment_ratio: self.ai.alignment_ratio,
            hold_duration: Duration::from_millis(self.recording.hold_duration_ms),
            // A zero period would spin the detection loop.
            frame_interval: Duration::from_millis(self.ai.frame_interval_ms.max(1)),
            preferred_mime_type: (!preferred.is_empty()).then(|| preferred.to_string()),
            constraints: VideoConstraints {
                width: self.video.width,
                height: self.video.height,
                frame_rate: self.video.frame_rate,
            },
        }
    }
}
