//! Session controller
//!
//! Async entry point for arming, stopping, exporting and discarding. Owns the
//! shared coordinator, the collaborator factories and the detection loop.

use super::coordinator::{RecordingCoordinator, RecordingEvent, SharedCoordinator};
use super::detection::DetectionLoop;
use super::state::{RecordingError, RecordingResult, RecordingState, TriggerConfig};
use crate::capture::MediaProvider;
use crate::export::{ArtifactConsumer, ExportReceipt};
use crate::pose::{EngineState, EstimatorLoader, ModelVariant, PoseLabel};
use crate::utils::error::ErrorResponse;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct SessionController {
    coordinator: SharedCoordinator,
    loader: Arc<dyn EstimatorLoader>,
    provider: Arc<dyn MediaProvider>,
    detection: Mutex<Option<DetectionLoop>>,
}

impl SessionController {
    pub fn new(
        config: TriggerConfig,
        loader: Arc<dyn EstimatorLoader>,
        provider: Arc<dyn MediaProvider>,
    ) -> Self {
        Self {
            coordinator: RecordingCoordinator::shared(config),
            loader,
            provider,
            detection: Mutex::new(None),
        }
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        &self.coordinator
    }

    pub fn state(&self) -> RecordingState {
        self.coordinator.lock().state()
    }

    pub fn engine_state(&self) -> EngineState {
        self.coordinator.lock().engine_state()
    }

    pub fn latest_label(&self) -> PoseLabel {
        self.coordinator.lock().latest_label()
    }

    pub fn last_error(&self) -> Option<ErrorResponse> {
        self.coordinator.lock().last_error().cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.coordinator.lock().subscribe()
    }

    /// Load the estimator, acquire the camera and start detecting.
    ///
    /// Only valid from IDLE. If the session is force-stopped while either
    /// resource is loading, whatever arrived is released and `Cancelled` is
    /// returned.
    pub async fn arm(&self, model: ModelVariant) -> RecordingResult<()> {
        let (token, constraints, frame_interval) = {
            let mut coordinator = self.coordinator.lock();
            let token = coordinator.begin_arm()?;
            let config = coordinator.config();
            (token, config.constraints, config.frame_interval)
        };
        tracing::info!("Arming session with model '{}'", model.as_str());

        let estimator = match self.loader.load(model).await {
            Ok(estimator) => estimator,
            Err(e) => {
                let error = RecordingError::from(e);
                self.coordinator.lock().fail_arm(&token, &error);
                return Err(error);
            }
        };
        if token.is_cancelled() {
            tracing::debug!("Session torn down while loading the estimator");
            let mut estimator = estimator;
            estimator.close();
            return Err(RecordingError::Cancelled);
        }

        let source = match self.provider.acquire(&constraints).await {
            Ok(source) => source,
            Err(e) => {
                let mut estimator = estimator;
                estimator.close();
                let error = RecordingError::from(e);
                self.coordinator.lock().fail_arm(&token, &error);
                return Err(error);
            }
        };
        tracing::info!("Acquired media source '{}'", source.label());

        self.coordinator.lock().complete_arm(&token, estimator, source)?;

        let detection = DetectionLoop::spawn(self.coordinator.clone(), frame_interval);
        if let Some(previous) = self.detection.lock().replace(detection) {
            previous.stop();
        }
        Ok(())
    }

    /// Tear down the session from any state. Returns whether anything was
    /// running.
    pub fn force_stop(&self) -> bool {
        if let Some(detection) = self.detection.lock().take() {
            detection.stop();
        }
        let stopped = self.coordinator.lock().force_stop();
        if stopped {
            tracing::info!("Session force-stopped");
        }
        stopped
    }

    /// Hand the reviewed artifact to `consumer` and return to IDLE.
    ///
    /// The artifact is released before the consumer runs, so a failed export
    /// cannot be retried.
    pub async fn export(&self, consumer: &dyn ArtifactConsumer) -> RecordingResult<ExportReceipt> {
        let artifact = self.coordinator.lock().take_for_export()?;
        tracing::info!("Exporting artifact {} ({} bytes)", artifact.id(), artifact.len());

        match consumer.consume(artifact).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                tracing::error!("Export failed: {}", e);
                Err(RecordingError::Export(e))
            }
        }
    }

    pub fn discard(&self) -> RecordingResult<()> {
        self.coordinator.lock().discard()
    }

    /// Wait for the detection loop to exit on its own
    pub async fn wait_for_detection(&self) {
        let detection = self.detection.lock().take();
        if let Some(detection) = detection {
            detection.join().await;
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.force_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        CaptureError, CaptureResult, MediaSource, SyntheticProvider, VideoConstraints,
    };
    use crate::export::DirectoryExporter;
    use crate::pose::{EstimatorError, PoseScript, ScriptStep, ScriptedLoader, ScriptedPose};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    fn step(pose: ScriptedPose, duration_ms: u64) -> ScriptStep {
        ScriptStep { pose, duration_ms }
    }

    fn gesture_script() -> PoseScript {
        PoseScript::new(vec![
            step(ScriptedPose::Neutral, 200),
            step(ScriptedPose::Start, 800),
            step(ScriptedPose::Neutral, 400),
            step(ScriptedPose::Stop, 800),
        ])
    }

    fn controller(
        loader: Arc<ScriptedLoader>,
        provider: Arc<SyntheticProvider>,
    ) -> SessionController {
        SessionController::new(TriggerConfig::default(), loader, provider)
    }

    async fn wait_for_state(
        events: &mut broadcast::Receiver<RecordingEvent>,
        target: RecordingState,
    ) {
        loop {
            match events.recv().await {
                Ok(RecordingEvent::StateChanged { to, .. }) if to == target => return,
                Ok(_) => {}
                Err(e) => panic!("event stream ended: {}", e),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_session_end_to_end() {
        let loader = Arc::new(ScriptedLoader::new(gesture_script()));
        let provider = Arc::new(SyntheticProvider::feeding());
        let controller = controller(loader.clone(), provider.clone());
        let mut events = controller.subscribe();

        controller.arm(ModelVariant::Lite).await.unwrap();
        assert_eq!(controller.state(), RecordingState::Armed);
        assert_eq!(controller.engine_state(), EngineState::Ready);

        let reviewed = wait_for_state(&mut events, RecordingState::Review);
        tokio::time::timeout(Duration::from_secs(10), reviewed).await.unwrap();
        assert_eq!(loader.close_count(), 1);
        assert_eq!(provider.latest().unwrap().release_count(), 1);

        let dir = tempdir().unwrap();
        let receipt = controller.export(&DirectoryExporter::new(dir.path())).await.unwrap();
        assert!(receipt.bytes > 0);
        assert_eq!(receipt.mime_type, "video/webm; codecs=vp9");
        assert!(receipt.path.exists());
        assert_eq!(controller.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_estimator_failure_leaves_idle() {
        let loader = Arc::new(ScriptedLoader::failing(EstimatorError::ModelUnavailable(
            "heavy".to_string(),
        )));
        let provider = Arc::new(SyntheticProvider::manual());
        let controller = controller(loader, provider.clone());

        let result = controller.arm(ModelVariant::Heavy).await;
        assert!(matches!(result, Err(RecordingError::Estimator(_))));
        assert_eq!(controller.state(), RecordingState::Idle);
        assert_eq!(controller.engine_state(), EngineState::Error);
        assert!(provider.sources().is_empty());
        assert_eq!(controller.last_error().map(|e| e.code), Some("ESTIMATOR_ERROR".to_string()));
    }

    #[tokio::test]
    async fn test_acquisition_failure_closes_estimator() {
        let loader = Arc::new(ScriptedLoader::new(PoseScript::default()));
        let provider = Arc::new(SyntheticProvider::failing(CaptureError::PermissionDenied(
            "camera".to_string(),
        )));
        let controller = controller(loader.clone(), provider);

        let result = controller.arm(ModelVariant::Lite).await;
        assert!(matches!(result, Err(RecordingError::Capture(CaptureError::PermissionDenied(_)))));
        assert_eq!(loader.load_count(), 1);
        assert_eq!(loader.close_count(), 1);
        assert_eq!(controller.state(), RecordingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_frame_interval_is_clamped() {
        let script = PoseScript::new(vec![step(ScriptedPose::Start, 2000)]);
        let config = TriggerConfig {
            frame_interval: Duration::ZERO,
            ..TriggerConfig::default()
        };
        let provider = Arc::new(SyntheticProvider::feeding());
        let controller = SessionController::new(
            config,
            Arc::new(ScriptedLoader::new(script)),
            provider.clone(),
        );

        controller.arm(ModelVariant::Lite).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(controller.state(), RecordingState::Recording);
        assert!(controller.last_error().is_none());
        assert!(controller.force_stop());
        assert_eq!(provider.latest().unwrap().release_count(), 1);
    }

    #[tokio::test]
    async fn test_arm_twice_is_rejected() {
        let loader = Arc::new(ScriptedLoader::new(PoseScript::default()));
        let controller = controller(loader, Arc::new(SyntheticProvider::manual()));
        controller.arm(ModelVariant::Lite).await.unwrap();

        assert!(matches!(
            controller.arm(ModelVariant::Lite).await,
            Err(RecordingError::InvalidTransition { .. })
        ));
        assert!(controller.force_stop());
    }

    /// Provider that blocks until released, to force-stop mid-arm
    struct GatedProvider {
        gate: Notify,
        inner: SyntheticProvider,
    }

    #[async_trait]
    impl MediaProvider for GatedProvider {
        async fn acquire(
            &self,
            constraints: &VideoConstraints,
        ) -> CaptureResult<Arc<dyn MediaSource>> {
            self.gate.notified().await;
            self.inner.acquire(constraints).await
        }
    }

    #[tokio::test]
    async fn test_force_stop_mid_arm_releases_late_resources() {
        let loader = Arc::new(ScriptedLoader::new(PoseScript::default()));
        let provider = Arc::new(GatedProvider {
            gate: Notify::new(),
            inner: SyntheticProvider::manual(),
        });
        let controller = Arc::new(SessionController::new(
            TriggerConfig::default(),
            loader.clone(),
            provider.clone(),
        ));

        let arming = tokio::spawn({
            let controller = controller.clone();
            async move { controller.arm(ModelVariant::Lite).await }
        });
        tokio::task::yield_now().await;
        while loader.load_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(controller.force_stop());
        provider.gate.notify_one();
        let result = arming.await.unwrap();

        assert!(matches!(result, Err(RecordingError::Cancelled)));
        assert_eq!(controller.state(), RecordingState::Idle);
        assert_eq!(loader.close_count(), 1);
        assert_eq!(provider.inner.latest().unwrap().release_count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_cycles_release_every_source_once() {
        let loader = Arc::new(ScriptedLoader::new(PoseScript::default()));
        let provider = Arc::new(SyntheticProvider::manual().keeping_history());
        let controller = controller(loader.clone(), provider.clone());

        for _ in 0..5 {
            controller.arm(ModelVariant::Full).await.unwrap();
            assert!(controller.force_stop());
        }

        let sources = provider.sources();
        assert_eq!(sources.len(), 5);
        assert!(sources.iter().all(|s| s.release_count() == 1));
        assert_eq!(loader.close_count(), 5);
    }

    /// Consumer that always fails
    struct Rejecting;

    #[async_trait]
    impl ArtifactConsumer for Rejecting {
        async fn consume(
            &self,
            _artifact: crate::capture::Artifact,
        ) -> crate::export::ExportResult<ExportReceipt> {
            Err(crate::export::ExportError::Rejected("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_export_outside_review() {
        let controller = controller(
            Arc::new(ScriptedLoader::new(PoseScript::default())),
            Arc::new(SyntheticProvider::manual()),
        );
        assert!(matches!(
            controller.export(&Rejecting).await,
            Err(RecordingError::InvalidTransition { .. })
        ));
        assert!(controller.discard().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_export_still_leaves_review() {
        let loader = Arc::new(ScriptedLoader::new(gesture_script()));
        let controller = controller(loader, Arc::new(SyntheticProvider::feeding()));
        let mut events = controller.subscribe();
        controller.arm(ModelVariant::Lite).await.unwrap();
        let reviewed = wait_for_state(&mut events, RecordingState::Review);
        tokio::time::timeout(Duration::from_secs(10), reviewed).await.unwrap();

        let result = controller.export(&Rejecting).await;
        assert!(matches!(result, Err(RecordingError::Export(_))));
        assert_eq!(controller.state(), RecordingState::Idle);
    }
}
