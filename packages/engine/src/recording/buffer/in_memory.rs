// packages/engine/src/recording/buffer/in_memory.rs
//! In-process event buffer
//!
//! Keeps events resident and serializes them to a JSON array on finish.

use crate::recording::buffer::EventBuffer;
use crate::recording::event::{EventMarker, RecordingData, RecordingEvent};
use crate::utils::errors::BufferError;
use async_trait::async_trait;
use tracing::debug;

/// Uncompressed event buffer
#[derive(Debug, Default)]
pub struct InMemoryEventBuffer {
    events: Vec<RecordingEvent>,
    markers: Vec<EventMarker>,
    last_checkout: Option<usize>,
    destroyed: bool,
}

impl InMemoryEventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events added since the last finish
    pub fn events(&self) -> &[RecordingEvent] {
        &self.events
    }
}

#[async_trait]
impl EventBuffer for InMemoryEventBuffer {
    fn pending_length(&self) -> usize {
        self.events.len()
    }

    fn pending_events(&self) -> &[EventMarker] {
        &self.markers
    }

    fn last_checkout(&self) -> Option<usize> {
        self.last_checkout
    }

    fn is_compressed(&self) -> bool {
        false
    }

    async fn add_event(&mut self, event: RecordingEvent, is_checkout: bool) -> Result<(), BufferError> {
        if self.destroyed {
            return Err(BufferError::Destroyed);
        }

        if is_checkout {
            self.last_checkout = Some(self.events.len());
        }
        self.markers.push(EventMarker::of(&event, is_checkout));
        self.events.push(event);

        Ok(())
    }

    async fn finish(&mut self) -> Result<RecordingData, BufferError> {
        if self.destroyed {
            return Err(BufferError::Destroyed);
        }

        let events = std::mem::take(&mut self.events);
        self.markers.clear();
        self.last_checkout = None;

        debug!("Finishing in-memory buffer with {} events", events.len());

        let json = serde_json::to_string(&events)?;
        Ok(RecordingData::Raw(json))
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.events.clear();
        self.markers.clear();
        self.last_checkout = None;
    }
}
