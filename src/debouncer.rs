use std::time::{Duration, Instant};

/// A simple debouncer that tracks when an action should be triggered
/// after a period of inactivity.
///
/// Each `trigger` restarts the window, so only the last call in a burst
/// fires. The `_at` variants take an explicit clock reading.
#[derive(Debug, Clone)]
pub struct Debouncer {
    /// The duration to wait after the last event before triggering
    delay: Duration,
    /// When the last event occurred
    last_event: Option<Instant>,
}

impl Debouncer {
    /// Create a new debouncer with the specified delay in milliseconds
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            last_event: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Register that an event occurred
    pub fn trigger(&mut self) {
        self.trigger_at(Instant::now());
    }

    pub fn trigger_at(&mut self, now: Instant) {
        self.last_event = Some(now);
    }

    /// Check if enough time has passed to execute the debounced action.
    /// Returns true at most once per burst of triggers.
    pub fn should_execute(&mut self) -> bool {
        self.should_execute_at(Instant::now())
    }

    pub fn should_execute_at(&mut self, now: Instant) -> bool {
        match self.last_event {
            Some(last) if now.saturating_duration_since(last) >= self.delay => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }

    /// Get the time remaining before the action will trigger
    /// Returns None if no action is pending
    pub fn time_remaining_at(&self, now: Instant) -> Option<Duration> {
        self.last_event
            .map(|last| self.delay.saturating_sub(now.saturating_duration_since(last)))
    }

    /// Reset the debouncer, canceling any pending action
    pub fn reset(&mut self) {
        self.last_event = None;
    }

    /// Check if there's a pending action
    pub fn is_pending(&self) -> bool {
        self.last_event.is_some()
    }
}
