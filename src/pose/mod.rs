//! Pose understanding
//!
//! Landmark types, the trigger pose classifier, and the estimator
//! collaborator boundary.

pub mod classifier;
pub mod estimator;
pub mod landmarks;
pub mod scripted;

pub use classifier::{PoseClassifier, PoseLabel};
pub use estimator::{
    available_models, EngineState, EstimatorError, EstimatorLoader, EstimatorResult, ModelVariant,
    PoseEstimator,
};
pub use landmarks::{BodyKeypoint, Landmark, LandmarkSet};
pub use scripted::{PoseScript, ScriptStep, ScriptedEstimator, ScriptedLoader, ScriptedPose};
