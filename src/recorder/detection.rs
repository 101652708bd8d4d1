//! Detection loop
//!
//! Drives the coordinator at a fixed frame interval on a background task.

use super::coordinator::{SharedCoordinator, TickOutcome};
use super::state::RecordingError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Shortest tick period; tokio intervals reject a zero period
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running detection loop
pub struct DetectionLoop {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DetectionLoop {
    /// Start ticking `coordinator` every `frame_interval`.
    ///
    /// The loop ends on its own once the coordinator has nothing left to
    /// detect, or when [`DetectionLoop::stop`] is called. If the loop dies
    /// abnormally the session is failed so its resources are released.
    pub fn spawn(coordinator: SharedCoordinator, frame_interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let frame_interval = frame_interval.max(MIN_FRAME_INTERVAL);

        let worker = tokio::spawn(run_loop(coordinator.clone(), frame_interval, running.clone()));
        let flag = running.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.await {
                tracing::error!("Detection task ended abnormally: {}", e);
                let reason = if e.is_panic() { "task panicked" } else { "task cancelled" };
                let error = RecordingError::DetectionFailed(reason.to_string());
                coordinator.lock().fail_session(error);
            }
            flag.store(false, Ordering::SeqCst);
            tracing::debug!("Detection loop stopped");
        });

        Self {
            running,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the loop to stop at its next tick. Safe to call repeatedly.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("Detection loop stop requested");
        }
    }

    /// Wait for the background task to exit
    pub async fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Detection task ended abnormally: {}", e);
            }
        }
    }
}

async fn run_loop(
    coordinator: SharedCoordinator,
    frame_interval: Duration,
    running: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::debug!("Detection loop started ({:?} interval)", frame_interval);

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let outcome = coordinator.lock().tick(Instant::now());
        match outcome {
            TickOutcome::Continue => {}
            TickOutcome::Halt => break,
            TickOutcome::Finalize(job) => {
                let (token, result) = job.run().await;
                let applied = coordinator.lock().complete_finalize(&token, result);
                match applied {
                    Ok(()) | Err(RecordingError::Cancelled) => {}
                    Err(e) => tracing::error!("Failed to finalize recording: {}", e),
                }
            }
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
