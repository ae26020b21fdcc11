// packages/engine/src/recording/event_queue.rs
//! Bounded lock-free intake queue
//!
//! Producers (the recording library, on any thread) push events here without
//! blocking; the replay container drains it from its own task. A full queue
//! drops the newest event and counts it.

use crate::observability::EVENTS_DROPPED;
use crate::recording::event::RecordingEvent;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Event waiting to enter the buffer
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub event: RecordingEvent,
    pub is_checkout: bool,
}

/// Lock-free event queue
pub struct EventQueue {
    /// Underlying bounded queue
    queue: ArrayQueue<QueuedEvent>,

    /// Push counter
    push_count: AtomicU64,

    /// Pop counter
    pop_count: AtomicU64,

    /// Drop counter (queue full)
    drop_count: AtomicU64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            push_count: AtomicU64::new(0),
            pop_count: AtomicU64::new(0),
            drop_count: AtomicU64::new(0),
        }
    }

    /// Push an event (non-blocking)
    pub fn push(&self, item: QueuedEvent) -> Result<(), QueuedEvent> {
        match self.queue.push(item) {
            Ok(()) => {
                self.push_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(item) => {
                self.drop_count.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(EVENTS_DROPPED).increment(1);
                Err(item)
            }
        }
    }

    /// Try to pop an event (non-blocking)
    pub fn try_pop(&self) -> Option<QueuedEvent> {
        let item = self.queue.pop()?;
        self.pop_count.fetch_add(1, Ordering::Relaxed);
        Some(item)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            pop_count: self.pop_count.load(Ordering::Relaxed),
            drop_count: self.drop_count.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Queue statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Total events pushed
    pub push_count: u64,

    /// Total events popped
    pub pop_count: u64,

    /// Total events dropped (queue full)
    pub drop_count: u64,

    /// Current queue size
    pub current_size: usize,

    /// Queue capacity
    pub capacity: usize,
}

impl QueueStats {
    /// Dropped events as a percentage of attempted pushes
    pub fn drop_rate(&self) -> f64 {
        let attempted = self.push_count + self.drop_count;
        if attempted == 0 {
            0.0
        } else {
            (self.drop_count as f64 / attempted as f64) * 100.0
        }
    }
}
