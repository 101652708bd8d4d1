//! Scripted pose estimator
//!
//! Plays back a pose timeline instead of running a model. Used by the replay
//! binary and by tests to drive the recorder without a camera.

use super::estimator::{
    EstimatorError, EstimatorLoader, EstimatorResult, ModelVariant, PoseEstimator,
};
use super::landmarks::{BodyKeypoint, Landmark, LandmarkSet};
use crate::capture::VideoFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Canned body geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptedPose {
    /// Palms joined at elbow height
    Start,
    /// Palms joined at nose height
    Stop,
    /// Arms relaxed at the sides
    Neutral,
    /// Nobody in frame
    Absent,
}

/// Build a body landmark set for a canned pose.
///
/// Shoulders are 0.2 apart, the nose sits at y=0.2 and the elbows at y=0.6.
pub fn synthesize(pose: ScriptedPose) -> LandmarkSet {
    let mut landmarks = LandmarkSet::empty_body();
    if pose == ScriptedPose::Absent {
        return landmarks;
    }

    let place = |landmarks: &mut LandmarkSet, keypoint: BodyKeypoint, x: f32, y: f32| {
        landmarks.set(keypoint.index(), Landmark::new(x, y));
    };

    place(&mut landmarks, BodyKeypoint::Nose, 0.5, 0.2);
    place(&mut landmarks, BodyKeypoint::LeftShoulder, 0.4, 0.4);
    place(&mut landmarks, BodyKeypoint::RightShoulder, 0.6, 0.4);
    place(&mut landmarks, BodyKeypoint::LeftElbow, 0.35, 0.6);
    place(&mut landmarks, BodyKeypoint::RightElbow, 0.65, 0.6);

    let (left_wrist, right_wrist) = match pose {
        ScriptedPose::Start => ((0.49, 0.6), (0.51, 0.6)),
        ScriptedPose::Stop => ((0.49, 0.22), (0.51, 0.22)),
        _ => ((0.35, 0.85), (0.65, 0.85)),
    };
    place(&mut landmarks, BodyKeypoint::LeftWrist, left_wrist.0, left_wrist.1);
    place(&mut landmarks, BodyKeypoint::RightWrist, right_wrist.0, right_wrist.1);

    landmarks
}

/// One segment of a pose timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptStep {
    pub pose: ScriptedPose,
    #[serde(alias = "duration_ms")]
    pub duration_ms: u64,
}

/// A pose timeline, measured from the first frame the estimator sees
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseScript {
    pub steps: Vec<ScriptStep>,
}

impl PoseScript {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }

    /// Pose at `elapsed_ms` into the script; past the end nobody is in frame
    pub fn pose_at(&self, elapsed_ms: f64) -> ScriptedPose {
        let mut end = 0.0;
        for step in &self.steps {
            end += step.duration_ms as f64;
            if elapsed_ms < end {
                return step.pose;
            }
        }
        ScriptedPose::Absent
    }
}

/// Estimator that replays a [`PoseScript`]
pub struct ScriptedEstimator {
    script: PoseScript,
    origin_ms: Option<f64>,
    closed: bool,
    close_count: Arc<AtomicUsize>,
}

impl ScriptedEstimator {
    pub fn new(script: PoseScript) -> Self {
        Self {
            script,
            origin_ms: None,
            closed: false,
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PoseEstimator for ScriptedEstimator {
    fn is_ready(&self) -> bool {
        !self.closed
    }

    fn detect(
        &mut self,
        _frame: &VideoFrame,
        timestamp_ms: f64,
    ) -> EstimatorResult<Vec<LandmarkSet>> {
        if self.closed {
            return Err(EstimatorError::Inference("estimator is closed".to_string()));
        }
        let origin = *self.origin_ms.get_or_insert(timestamp_ms);
        match self.script.pose_at(timestamp_ms - origin) {
            ScriptedPose::Absent => Ok(Vec::new()),
            pose => Ok(vec![synthesize(pose)]),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Loader handing out [`ScriptedEstimator`]s
pub struct ScriptedLoader {
    script: PoseScript,
    failure: Option<EstimatorError>,
    loads: AtomicUsize,
    close_count: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    pub fn new(script: PoseScript) -> Self {
        Self {
            script,
            failure: None,
            loads: AtomicUsize::new(0),
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A loader whose every load fails with `error`
    pub fn failing(error: EstimatorError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(PoseScript::default())
        }
    }

    /// Number of engines handed out
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of engines closed
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EstimatorLoader for ScriptedLoader {
    async fn load(&self, model: ModelVariant) -> EstimatorResult<Box<dyn PoseEstimator>> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Loaded scripted estimator for model '{}'", model.as_str());

        let mut estimator = ScriptedEstimator::new(self.script.clone());
        estimator.close_count = self.close_count.clone();
        Ok(Box::new(estimator))
    }
}
