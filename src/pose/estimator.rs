//! Pose estimator collaborator traits
//!
//! The estimator turns video frames into landmark sets. Loading a model is
//! asynchronous and may fail; inference is synchronous and runs inside the
//! detection loop tick.

use super::landmarks::LandmarkSet;
use crate::capture::VideoFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Estimator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimatorError {
    #[error("Model asset not available: {0}")]
    ModelUnavailable(String),

    #[error("Failed to initialize model: {0}")]
    Initialization(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;

/// Model size/accuracy trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Lite,
    Full,
    Heavy,
}

impl Default for ModelVariant {
    fn default() -> Self {
        Self::Lite
    }
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] =
        [ModelVariant::Lite, ModelVariant::Full, ModelVariant::Heavy];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Lite => "lite",
            ModelVariant::Full => "full",
            ModelVariant::Heavy => "heavy",
        }
    }

    /// Display name for model pickers
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelVariant::Lite => "Lite",
            ModelVariant::Full => "Full",
            ModelVariant::Heavy => "Heavy",
        }
    }

    pub fn asset_file_name(&self) -> String {
        format!("pose_landmarker_{}.task", self.as_str())
    }

    pub fn asset_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.asset_file_name())
    }
}

/// Variants whose model asset is present in `models_dir`
pub fn available_models(models_dir: &Path) -> Vec<ModelVariant> {
    ModelVariant::ALL
        .into_iter()
        .filter(|variant| {
            let present = variant.asset_path(models_dir).is_file();
            if !present {
                tracing::debug!("Model file not found for '{}', hiding it", variant.as_str());
            }
            present
        })
        .collect()
}

/// Lifecycle of the estimator engine as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Cleared,
    Initializing,
    Ready,
    Error,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::Cleared
    }
}

/// A loaded pose estimation engine
pub trait PoseEstimator: Send {
    /// Whether the engine can accept frames
    fn is_ready(&self) -> bool;

    /// Run inference on one frame. Returns one landmark set per detected
    /// subject, in detection order.
    fn detect(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: f64,
    ) -> EstimatorResult<Vec<LandmarkSet>>;

    /// Release the engine. Must tolerate being called more than once.
    fn close(&mut self);
}

/// Factory for pose estimation engines
#[async_trait]
pub trait EstimatorLoader: Send + Sync {
    /// Load and initialize a model; the returned engine is ready for frames
    async fn load(&self, model: ModelVariant) -> EstimatorResult<Box<dyn PoseEstimator>>;
}
