//! Gesture-triggered recorder
//!
//! This module implements the recording lifecycle:
//! - GestureDebouncer to confirm held trigger poses
//! - RecordingCoordinator to drive the IDLE → ARMED → RECORDING →
//!   FINALIZING → REVIEW state machine
//! - DetectionLoop to tick the coordinator once per frame
//! - SessionController as the async entry point

pub mod controller;
pub mod coordinator;
pub mod debounce;
pub mod detection;
pub mod state;

pub use controller::SessionController;
pub use coordinator::{
    FinalizeJob, RecordingCoordinator, RecordingEvent, SharedCoordinator, TickOutcome,
};
pub use debounce::{DebounceOutcome, DebounceState, GestureDebouncer};
pub use detection::DetectionLoop;
pub use state::{
    LifecycleEvent, RecordingError, RecordingResult, RecordingState, SessionToken, TriggerConfig,
};
