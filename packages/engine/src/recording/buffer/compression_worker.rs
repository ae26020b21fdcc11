// packages/engine/src/recording/buffer/compression_worker.rs
//! Worker-backed event buffer
//!
//! Serialized events move into the worker's incremental compressor as they
//! arrive; only markers for the logical order stay here.

use crate::recording::buffer::EventBuffer;
use crate::recording::event::{EventMarker, RecordingData, RecordingEvent};
use crate::utils::errors::BufferError;
use crate::worker::{WorkerBridge, WorkerMethod, WorkerPayload};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// Event buffer that compresses through the worker bridge
pub struct CompressionWorkerEventBuffer {
    bridge: WorkerBridge,
    markers: Vec<EventMarker>,
    last_checkout: Option<usize>,
    destroyed: bool,
}

impl CompressionWorkerEventBuffer {
    pub fn new(bridge: WorkerBridge) -> Self {
        Self {
            bridge,
            markers: Vec::new(),
            last_checkout: None,
            destroyed: false,
        }
    }

    /// Confirm the worker answers by resetting its compressor
    pub async fn ensure_ready(&self) -> Result<(), BufferError> {
        self.bridge.post_message(WorkerMethod::Init, None).await?;
        Ok(())
    }
}

#[async_trait]
impl EventBuffer for CompressionWorkerEventBuffer {
    fn pending_length(&self) -> usize {
        self.markers.len()
    }

    fn pending_events(&self) -> &[EventMarker] {
        &self.markers
    }

    fn last_checkout(&self) -> Option<usize> {
        self.last_checkout
    }

    fn is_compressed(&self) -> bool {
        true
    }

    async fn add_event(&mut self, event: RecordingEvent, is_checkout: bool) -> Result<(), BufferError> {
        if self.destroyed {
            return Err(BufferError::Destroyed);
        }

        let json = serde_json::to_string(&event)?;
        self.bridge.post_message(WorkerMethod::AddEvent, Some(json)).await?;

        if is_checkout {
            self.last_checkout = Some(self.markers.len());
        }
        self.markers.push(EventMarker::of(&event, is_checkout));

        Ok(())
    }

    async fn finish(&mut self) -> Result<RecordingData, BufferError> {
        if self.destroyed {
            return Err(BufferError::Destroyed);
        }

        let count = self.markers.len();
        self.markers.clear();
        self.last_checkout = None;

        match self.bridge.post_message(WorkerMethod::Finish, None).await? {
            WorkerPayload::Compressed(bytes) => {
                debug!("Worker finished segment: {} events, {} bytes", count, bytes.len());
                Ok(RecordingData::Compressed(Bytes::from(bytes)))
            }
            other => Err(BufferError::Compression(format!(
                "unexpected worker payload for finish: {:?}",
                other
            ))),
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.markers.clear();
        self.last_checkout = None;
        self.bridge.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::compressor::{CompressionLevel, Compressor};
    use crate::recording::event::EventType;
    use crate::utils::errors::WorkerError;
    use std::time::Duration;

    async fn buffer() -> CompressionWorkerEventBuffer {
        let bridge = WorkerBridge::spawn(CompressionLevel::Fast, Duration::from_secs(5)).unwrap();
        let buffer = CompressionWorkerEventBuffer::new(bridge);
        buffer.ensure_ready().await.unwrap();
        buffer
    }

    fn decode(data: RecordingData) -> Vec<RecordingEvent> {
        let RecordingData::Compressed(bytes) = data else {
            panic!("expected compressed payload");
        };
        let json = Compressor::default().decompress(&bytes).unwrap();
        serde_json::from_slice(&json).unwrap()
    }

    #[tokio::test]
    async fn test_compressed_segment_contains_events() {
        let mut buffer = buffer().await;

        buffer
            .add_event(RecordingEvent::new(EventType::FullSnapshot, 10, serde_json::json!({"a": 1})), true)
            .await
            .unwrap();
        buffer
            .add_event(RecordingEvent::new(EventType::IncrementalSnapshot, 20, serde_json::json!({})), false)
            .await
            .unwrap();

        assert_eq!(buffer.pending_length(), 2);
        assert_eq!(buffer.last_checkout(), Some(0));
        assert_eq!(buffer.earliest_timestamp(), Some(10));

        let events = decode(buffer.finish().await.unwrap());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::FullSnapshot);
        assert_eq!(buffer.pending_length(), 0);
    }

    #[tokio::test]
    async fn test_finish_empty_returns_empty_array() {
        let mut buffer = buffer().await;
        assert!(decode(buffer.finish().await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_destroyed_worker_buffer() {
        let mut buffer = buffer().await;
        buffer.destroy();
        buffer.destroy();

        assert!(matches!(
            buffer.add_event(RecordingEvent::new(EventType::Meta, 1, serde_json::json!({})), false).await,
            Err(BufferError::Destroyed)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_worker_surfaces_error() {
        let bridge = WorkerBridge::spawn(CompressionLevel::Fast, Duration::from_secs(5)).unwrap();
        bridge.destroy();
        let mut buffer = CompressionWorkerEventBuffer::new(bridge);

        let err = buffer
            .add_event(RecordingEvent::new(EventType::Meta, 1, serde_json::json!({})), false)
            .await
            .unwrap_err();
        assert!(matches!(err, BufferError::Worker(WorkerError::Unreachable)));
        assert_eq!(buffer.pending_length(), 0);
    }
}
