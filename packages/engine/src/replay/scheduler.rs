// packages/engine/src/replay/scheduler.rs
//! Debounce-with-ceiling flush scheduling
//!
//! Every qualifying update pushes the quiet-period deadline out by the
//! minimum delay. The first update after a flush also fixes a ceiling
//! deadline that later updates never move. Whichever deadline comes first is
//! when the flush fires; firing clears both.

use std::time::Duration;
use tokio::time::Instant;

/// Pending flush deadlines
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    min_delay: Duration,
    max_delay: Duration,
    min_deadline: Option<Instant>,
    max_deadline: Option<Instant>,
}

impl FlushScheduler {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            min_deadline: None,
            max_deadline: None,
        }
    }

    /// Register a qualifying update at `now`
    pub fn on_update(&mut self, now: Instant) {
        if self.max_deadline.is_none() {
            self.max_deadline = Some(now + self.max_delay);
        }
        self.min_deadline = Some(now + self.min_delay);
    }

    /// When the pending flush fires, if one is scheduled
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.min_deadline, self.max_deadline) {
            (Some(min), Some(max)) => Some(min.min(max)),
            (min, max) => min.or(max),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.max_deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline().map_or(false, |deadline| deadline <= now)
    }

    /// Drop both deadlines
    pub fn cancel(&mut self) {
        self.min_deadline = None;
        self.max_deadline = None;
    }
}
