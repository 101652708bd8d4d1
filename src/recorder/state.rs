//! Recording state management
//!
//! Defines the recording lifecycle state machine, its errors, and the
//! configuration injected into the recorder.

use crate::capture::{CaptureError, VideoConstraints, DEFAULT_PREFERRED_MIME_TYPE};
use crate::export::ExportError;
use crate::pose::classifier::{DEFAULT_ALIGNMENT_RATIO, DEFAULT_PROXIMITY_RATIO};
use crate::pose::{EstimatorError, PoseLabel};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Current state of the recording lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No session; nothing is acquired
    Idle,
    /// Camera and estimator live, waiting for the start pose
    Armed,
    /// Capturing, waiting for the stop pose
    Recording,
    /// Stop confirmed, the capture is being finalized
    Finalizing,
    /// An artifact is waiting to be exported or discarded
    Review,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Inputs that move the lifecycle forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleEvent {
    Arm,
    StartConfirmed,
    StopConfirmed,
    Finalized,
    Export,
    Discard,
    ForceStop,
}

impl RecordingState {
    /// Apply `event`, returning the next state or the rejected transition
    pub fn next(self, event: LifecycleEvent) -> RecordingResult<RecordingState> {
        use LifecycleEvent as E;
        use RecordingState::*;

        match (self, event) {
            (_, E::ForceStop) => Ok(Idle),
            (Idle, E::Arm) => Ok(Armed),
            (Armed, E::StartConfirmed) => Ok(Recording),
            (Recording, E::StopConfirmed) => Ok(Finalizing),
            (Finalizing, E::Finalized) => Ok(Review),
            (Review, E::Export | E::Discard) => Ok(Idle),
            (from, event) => Err(RecordingError::InvalidTransition { from, event }),
        }
    }

    /// The pose that must be held to leave this state, if any
    pub fn trigger_label(self) -> Option<PoseLabel> {
        match self {
            RecordingState::Armed => Some(PoseLabel::Start),
            RecordingState::Recording => Some(PoseLabel::Stop),
            RecordingState::Idle | RecordingState::Finalizing | RecordingState::Review => None,
        }
    }

    /// Whether camera, estimator and capture session are held
    pub fn holds_session(self) -> bool {
        matches!(
            self,
            RecordingState::Armed | RecordingState::Recording | RecordingState::Finalizing
        )
    }
}

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Cannot apply {event:?} while {from:?}")]
    InvalidTransition {
        from: RecordingState,
        event: LifecycleEvent,
    },

    #[error("A session is already being armed")]
    ArmInProgress,

    #[error("Operation cancelled by teardown")]
    Cancelled,

    #[error("No artifact available")]
    NoArtifact,

    #[error("Detection loop stopped unexpectedly: {0}")]
    DetectionFailed(String),

    #[error("Pose estimator error: {0}")]
    Estimator(#[from] EstimatorError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

impl RecordingError {
    /// Stable code for UI error signals
    pub fn code(&self) -> &'static str {
        match self {
            RecordingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RecordingError::ArmInProgress => "ARM_IN_PROGRESS",
            RecordingError::Cancelled => "CANCELLED",
            RecordingError::NoArtifact => "NO_ARTIFACT",
            RecordingError::DetectionFailed(_) => "DETECTION_FAILED",
            RecordingError::Estimator(_) => "ESTIMATOR_ERROR",
            RecordingError::Capture(CaptureError::Acquisition(_)) => "MEDIA_ACQUISITION_FAILED",
            RecordingError::Capture(CaptureError::PermissionDenied(_)) => "PERMISSION_DENIED",
            RecordingError::Capture(CaptureError::SourceFailed(_)) => "MEDIA_SOURCE_FAILED",
            RecordingError::Capture(_) => "CAPTURE_ERROR",
            RecordingError::Export(_) => "EXPORT_ERROR",
        }
    }
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Recorder configuration, injected at construction
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    /// Max wrist distance as a fraction of shoulder width
    pub proximity_ratio: f32,
    /// Vertical alignment margin as a fraction of shoulder width
    pub alignment_ratio: f32,
    /// How long a trigger pose must be held
    pub hold_duration: Duration,
    /// Detection loop period
    pub frame_interval: Duration,
    /// Codec tried first; `None` uses the source default
    pub preferred_mime_type: Option<String>,
    pub constraints: VideoConstraints,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            proximity_ratio: DEFAULT_PROXIMITY_RATIO,
            alignment_ratio: DEFAULT_ALIGNMENT_RATIO,
            hold_duration: Duration::from_millis(500),
            frame_interval: Duration::from_millis(16),
            preferred_mime_type: Some(DEFAULT_PREFERRED_MIME_TYPE.to_string()),
            constraints: VideoConstraints::default(),
        }
    }
}

/// Cancellation flag shared by one session's async handoffs
#[derive(Debug, Clone, Default)]
pub struct SessionToken(Arc<AtomicBool>);

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same session
    pub fn same_session(&self, other: &SessionToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;

    const ALL_STATES: [RecordingState; 5] = [
        RecordingState::Idle,
        RecordingState::Armed,
        RecordingState::Recording,
        RecordingState::Finalizing,
        RecordingState::Review,
    ];

    const ALL_EVENTS: [LifecycleEvent; 7] = [
        E::Arm,
        E::StartConfirmed,
        E::StopConfirmed,
        E::Finalized,
        E::Export,
        E::Discard,
        E::ForceStop,
    ];

    #[test]
    fn test_happy_path() {
        let mut state = RecordingState::Idle;
        for event in [E::Arm, E::StartConfirmed, E::StopConfirmed, E::Finalized, E::Export] {
            state = state.next(event).unwrap();
        }
        assert_eq!(state, RecordingState::Idle);
    }

    #[test]
    fn test_force_stop_from_anywhere() {
        for state in ALL_STATES {
            assert_eq!(state.next(E::ForceStop).unwrap(), RecordingState::Idle);
        }
    }

    #[test]
    fn test_recording_only_from_armed() {
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                if state.next(event).ok() == Some(RecordingState::Recording) {
                    assert_eq!((state, event), (RecordingState::Armed, E::StartConfirmed));
                }
            }
        }
    }

    #[test]
    fn test_review_only_from_finalizing() {
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                if state.next(event).ok() == Some(RecordingState::Review) {
                    assert_eq!((state, event), (RecordingState::Finalizing, E::Finalized));
                }
            }
        }
    }

    #[test]
    fn test_invalid_transition_reports_both_sides() {
        let err = RecordingState::Review.next(E::Arm).unwrap_err();
        assert!(matches!(
            err,
            RecordingError::InvalidTransition {
                from: RecordingState::Review,
                event: E::Arm
            }
        ));
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_trigger_labels() {
        assert_eq!(RecordingState::Armed.trigger_label(), Some(PoseLabel::Start));
        assert_eq!(RecordingState::Recording.trigger_label(), Some(PoseLabel::Stop));
        assert_eq!(RecordingState::Finalizing.trigger_label(), None);
    }

    #[test]
    fn test_token_clones_share_cancellation() {
        let token = SessionToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.same_session(&clone));
        assert!(!token.same_session(&SessionToken::new()));
    }
}
