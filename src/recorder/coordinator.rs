//! Recording coordinator
//!
//! Owns the recording lifecycle: combines the classified pose, the gesture
//! debouncer and the capture session, and holds the estimator and media
//! source for the duration of a session.
//!
//! All methods are synchronous. The only suspending step, finalizing a
//! capture, is handed out as a [`FinalizeJob`] that runs without the
//! coordinator and reports back through [`RecordingCoordinator::complete_finalize`].

use super::debounce::{DebounceOutcome, DebounceState, GestureDebouncer};
use super::state::{
    LifecycleEvent, RecordingError, RecordingResult, RecordingState, SessionToken, TriggerConfig,
};
use crate::capture::{
    Artifact, CaptureError, CaptureResult, CaptureSession, MediaSource, SourceStatus,
};
use crate::pose::{EngineState, PoseClassifier, PoseEstimator, PoseLabel};
use crate::utils::error::ErrorResponse;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Coordinator shared between the detection loop and the controller
pub type SharedCoordinator = Arc<Mutex<RecordingCoordinator>>;

/// Events emitted during a session
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// Lifecycle moved
    StateChanged {
        from: RecordingState,
        to: RecordingState,
    },
    /// The classified pose changed
    PoseChanged(PoseLabel),
    /// A finalized artifact is waiting for review
    ArtifactReady { bytes: usize, mime_type: String },
    /// The session was torn down by an error
    Error(ErrorResponse),
}

/// What the detection loop should do after a tick
pub enum TickOutcome {
    Continue,
    /// Run the finalize job, then report back
    Finalize(FinalizeJob),
    /// Nothing left to detect
    Halt,
}

/// A stopped capture waiting to be finalized
pub struct FinalizeJob {
    token: SessionToken,
    session: CaptureSession,
}

impl FinalizeJob {
    pub async fn run(mut self) -> (SessionToken, CaptureResult<Artifact>) {
        let result = self.session.stop().await;
        (self.token, result)
    }
}

pub struct RecordingCoordinator {
    config: TriggerConfig,
    classifier: PoseClassifier,
    state: RecordingState,
    debouncer: GestureDebouncer,
    latest_label: PoseLabel,
    last_frame_sequence: Option<u64>,
    engine_state: EngineState,
    estimator: Option<Box<dyn PoseEstimator>>,
    source: Option<Arc<dyn MediaSource>>,
    session: Option<CaptureSession>,
    artifact: Option<Artifact>,
    /// Token of the session being armed or running
    token: Option<SessionToken>,
    last_error: Option<ErrorResponse>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingCoordinator {
    pub fn new(config: TriggerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            classifier: PoseClassifier::new(config.proximity_ratio, config.alignment_ratio),
            debouncer: GestureDebouncer::new(config.hold_duration),
            config,
            state: RecordingState::Idle,
            latest_label: PoseLabel::None,
            last_frame_sequence: None,
            engine_state: EngineState::Cleared,
            estimator: None,
            source: None,
            session: None,
            artifact: None,
            token: None,
            last_error: None,
            event_tx,
        }
    }

    pub fn shared(config: TriggerConfig) -> SharedCoordinator {
        Arc::new(Mutex::new(Self::new(config)))
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine_state
    }

    pub fn latest_label(&self) -> PoseLabel {
        self.latest_label
    }

    pub fn debounce_state(&self) -> DebounceState {
        self.debouncer.state()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn last_error(&self) -> Option<&ErrorResponse> {
        self.last_error.as_ref()
    }

    /// Label of the live source, if a session holds one
    pub fn source_label(&self) -> Option<String> {
        self.source.as_ref().map(|s| s.label().to_string())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    fn transition(&mut self, event: LifecycleEvent) -> RecordingResult<()> {
        let from = self.state;
        let to = from.next(event)?;
        self.state = to;
        if from != to {
            tracing::info!("Recording state: {:?} -> {:?} ({:?})", from, to, event);
            self.emit(RecordingEvent::StateChanged { from, to });
        }
        Ok(())
    }

    fn publish_label(&mut self, label: PoseLabel) {
        if label != self.latest_label {
            tracing::debug!("Pose changed: {:?} -> {:?}", self.latest_label, label);
            self.latest_label = label;
            self.emit(RecordingEvent::PoseChanged(label));
        }
    }

    // ---------------------------------------------------------------------
    // Arm
    // ---------------------------------------------------------------------

    /// Reserve the coordinator for a new session.
    ///
    /// The returned token must accompany the resources when they arrive.
    pub fn begin_arm(&mut self) -> RecordingResult<SessionToken> {
        self.state.next(LifecycleEvent::Arm)?;
        if self.token.is_some() {
            return Err(RecordingError::ArmInProgress);
        }

        let token = SessionToken::new();
        self.token = Some(token.clone());
        self.engine_state = EngineState::Initializing;
        self.last_error = None;
        Ok(token)
    }

    /// Give up an arm attempt that failed before its resources arrived
    pub fn fail_arm(&mut self, token: &SessionToken, error: &RecordingError) {
        if !self.owns(token) {
            return;
        }
        tracing::error!("Failed to arm session: {}", error);
        self.token = None;
        self.engine_state = EngineState::Error;
        self.report(error);
    }

    /// Install the estimator and source and enter ARMED.
    ///
    /// When the attempt was cancelled in the meantime, or no encoder can be
    /// attached, both resources are released before returning the error.
    pub fn complete_arm(
        &mut self,
        token: &SessionToken,
        mut estimator: Box<dyn PoseEstimator>,
        source: Arc<dyn MediaSource>,
    ) -> RecordingResult<()> {
        if token.is_cancelled() || !self.owns(token) {
            tracing::debug!("Arm result arrived after teardown, releasing it");
            estimator.close();
            source.release();
            return Err(RecordingError::Cancelled);
        }

        let preferred = self.config.preferred_mime_type.as_deref();
        let session = match CaptureSession::new(source.clone(), preferred) {
            Ok(session) => session,
            Err(e) => {
                estimator.close();
                source.release();
                let error = RecordingError::from(e);
                self.fail_arm(token, &error);
                return Err(error);
            }
        };

        self.estimator = Some(estimator);
        self.source = Some(source);
        self.session = Some(session);
        self.engine_state = EngineState::Ready;
        self.latest_label = PoseLabel::None;
        self.last_frame_sequence = None;
        self.debouncer.reset();
        self.transition(LifecycleEvent::Arm)
    }

    fn owns(&self, token: &SessionToken) -> bool {
        self.token.as_ref().is_some_and(|t| t.same_session(token))
    }

    // ---------------------------------------------------------------------
    // Frame ticks
    // ---------------------------------------------------------------------

    /// One detection loop iteration: check the source, classify a fresh
    /// frame if there is one, then run the orchestration step.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if matches!(self.state, RecordingState::Armed | RecordingState::Recording) {
            if let Some(error) = self.source_failure() {
                self.fail_session(RecordingError::Capture(error));
                return TickOutcome::Halt;
            }
            self.sample_frame();
        }
        if let Some(session) = self.session.as_mut() {
            session.pump();
        }
        self.step(now)
    }

    fn source_failure(&self) -> Option<CaptureError> {
        let source = self.source.as_ref()?;
        match source.status() {
            SourceStatus::Live => None,
            SourceStatus::Ended => Some(CaptureError::SourceFailed(format!(
                "source '{}' ended unexpectedly",
                source.id()
            ))),
            SourceStatus::Failed(reason) => Some(CaptureError::SourceFailed(reason)),
        }
    }

    fn sample_frame(&mut self) {
        let Some(frame) = self.source.as_ref().and_then(|s| s.latest_frame()) else {
            return;
        };
        if self.last_frame_sequence == Some(frame.sequence) {
            return;
        }
        self.last_frame_sequence = Some(frame.sequence);

        let label = match self.estimator.as_mut() {
            Some(estimator) if estimator.is_ready() => {
                match estimator.detect(&frame, frame.timestamp_ms) {
                    Ok(subjects) => self.classifier.classify_first(&subjects),
                    Err(e) => {
                        tracing::warn!("Pose inference failed on frame {}: {}", frame.sequence, e);
                        PoseLabel::None
                    }
                }
            }
            _ => PoseLabel::None,
        };
        self.publish_label(label);
    }

    /// Set the published label directly, as a fresh classification would
    pub fn observe_label(&mut self, label: PoseLabel) {
        self.publish_label(label);
    }

    /// Debounce the latest label against the current state's trigger pose
    pub fn step(&mut self, now: Instant) -> TickOutcome {
        let outcome = self
            .debouncer
            .observe(self.state.trigger_label(), self.latest_label, now);

        match (self.state, outcome) {
            (RecordingState::Armed, DebounceOutcome::Confirmed) => self.confirm_start(),
            (RecordingState::Recording, DebounceOutcome::Confirmed) => self.confirm_stop(),
            (RecordingState::Armed | RecordingState::Recording | RecordingState::Finalizing, _) => {
                TickOutcome::Continue
            }
            (RecordingState::Idle | RecordingState::Review, _) => TickOutcome::Halt,
        }
    }

    fn confirm_start(&mut self) -> TickOutcome {
        let started = match self.session.as_mut() {
            Some(session) => session.start(),
            None => Err(CaptureError::Encoder("no capture session".to_string())),
        };
        if let Err(e) = started {
            self.fail_session(RecordingError::Capture(e));
            return TickOutcome::Halt;
        }
        match self.transition(LifecycleEvent::StartConfirmed) {
            Ok(()) => TickOutcome::Continue,
            Err(e) => {
                self.fail_session(e);
                TickOutcome::Halt
            }
        }
    }

    fn confirm_stop(&mut self) -> TickOutcome {
        if let Err(e) = self.transition(LifecycleEvent::StopConfirmed) {
            self.fail_session(e);
            return TickOutcome::Halt;
        }
        match (self.session.take(), self.token.clone()) {
            (Some(session), Some(token)) => TickOutcome::Finalize(FinalizeJob { token, session }),
            _ => {
                self.fail_session(RecordingError::NoArtifact);
                TickOutcome::Halt
            }
        }
    }

    /// Apply a finished finalize job.
    ///
    /// A result whose session was torn down meanwhile is dropped untouched.
    pub fn complete_finalize(
        &mut self,
        token: &SessionToken,
        result: CaptureResult<Artifact>,
    ) -> RecordingResult<()> {
        if token.is_cancelled() || !self.owns(token) || self.state != RecordingState::Finalizing {
            tracing::debug!("Finalize result arrived after teardown, dropping it");
            return Err(RecordingError::Cancelled);
        }

        let artifact = match result {
            Ok(artifact) => artifact,
            Err(e) => {
                self.fail_session(RecordingError::Capture(e.clone()));
                return Err(RecordingError::Capture(e));
            }
        };

        self.transition(LifecycleEvent::Finalized)?;
        self.release_resources();
        self.emit(RecordingEvent::ArtifactReady {
            bytes: artifact.len(),
            mime_type: artifact.mime_type().to_string(),
        });
        tracing::info!("Artifact ready for review: {} bytes", artifact.len());
        self.artifact = Some(artifact);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Teardown and review
    // ---------------------------------------------------------------------

    /// Release capture session, estimator and source. Each is released at
    /// most once; absent resources are skipped.
    fn release_resources(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        if let Some(mut session) = self.session.take() {
            session.abort();
        }
        if let Some(mut estimator) = self.estimator.take() {
            estimator.close();
            tracing::debug!("Pose engine released");
        }
        if let Some(source) = self.source.take() {
            source.release();
            tracing::debug!("Media source '{}' released", source.id());
        }
        self.engine_state = EngineState::Cleared;
        self.latest_label = PoseLabel::None;
        self.last_frame_sequence = None;
        self.debouncer.reset();
    }

    fn report(&mut self, error: &RecordingError) {
        let response = ErrorResponse::from(error);
        self.last_error = Some(response.clone());
        self.emit(RecordingEvent::Error(response));
    }

    /// Force-stop and report `error` as the reason
    pub fn fail_session(&mut self, error: RecordingError) {
        tracing::error!("Session failed in {:?}: {}", self.state, error);
        self.force_stop();
        self.report(&error);
    }

    /// Tear everything down and return to IDLE from any state.
    ///
    /// Cancels in-flight arm and finalize results, drops any artifact.
    /// Returns whether there was anything to tear down.
    pub fn force_stop(&mut self) -> bool {
        let had_work = self.state != RecordingState::Idle
            || self.token.is_some()
            || self.artifact.is_some();
        self.release_resources();
        if self.artifact.take().is_some() {
            tracing::debug!("Dropped unreviewed artifact");
        }
        // ForceStop is accepted from every state.
        let _ = self.transition(LifecycleEvent::ForceStop);
        had_work
    }

    /// Leave REVIEW handing the artifact to the caller
    pub fn take_for_export(&mut self) -> RecordingResult<Artifact> {
        self.state.next(LifecycleEvent::Export)?;
        let artifact = self.artifact.take().ok_or(RecordingError::NoArtifact)?;
        self.transition(LifecycleEvent::Export)?;
        Ok(artifact)
    }

    /// Leave REVIEW dropping the artifact
    pub fn discard(&mut self) -> RecordingResult<()> {
        self.state.next(LifecycleEvent::Discard)?;
        if let Some(artifact) = self.artifact.take() {
            tracing::info!("Discarded artifact {} ({} bytes)", artifact.id(), artifact.len());
        }
        self.transition(LifecycleEvent::Discard)
    }
}

impl Default for RecordingCoordinator {
    fn default() -> Self {
        Self::new(TriggerConfig::default())
    }
}
