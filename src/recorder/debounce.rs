//! Gesture hold debouncing

use crate::pose::PoseLabel;
use std::time::Duration;
use tokio::time::Instant;

/// Snapshot of the debouncer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    pub target_label: Option<PoseLabel>,
    pub held_since: Option<Instant>,
}

/// Result of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// No target, or the target is not being shown
    Waiting,
    /// Target shown continuously for this long, not yet enough
    Holding(Duration),
    /// Target held for the full duration. The hold is cleared.
    Confirmed,
}

/// Tracks how long a target label has been observed without interruption
#[derive(Debug, Clone)]
pub struct GestureDebouncer {
    hold_duration: Duration,
    target: Option<PoseLabel>,
    held_since: Option<Instant>,
}

impl GestureDebouncer {
    pub fn new(hold_duration: Duration) -> Self {
        Self {
            hold_duration,
            target: None,
            held_since: None,
        }
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold_duration
    }

    pub fn state(&self) -> DebounceState {
        DebounceState {
            target_label: self.target,
            held_since: self.held_since,
        }
    }

    pub fn reset(&mut self) {
        self.held_since = None;
    }

    /// Record one tick's label against the current target.
    ///
    /// A change of target or any tick showing a different label restarts
    /// the hold from zero.
    pub fn observe(
        &mut self,
        target: Option<PoseLabel>,
        observed: PoseLabel,
        now: Instant,
    ) -> DebounceOutcome {
        if target != self.target {
            self.target = target;
            self.held_since = None;
        }

        match target {
            Some(target) if observed == target => {
                let since = *self.held_since.get_or_insert(now);
                let held = now.saturating_duration_since(since);
                if held >= self.hold_duration {
                    self.held_since = None;
                    DebounceOutcome::Confirmed
                } else {
                    DebounceOutcome::Holding(held)
                }
            }
            _ => {
                self.held_since = None;
                DebounceOutcome::Waiting
            }
        }
    }
}
