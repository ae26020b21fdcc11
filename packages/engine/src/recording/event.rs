// packages/engine/src/recording/event.rs
//! Recorded event types
//!
//! The recording library produces these; the pipeline treats `data` as opaque
//! and only relies on `timestamp` ordering and the checkout flag.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Recorded event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DomContentLoaded,
    Load,
    FullSnapshot,
    IncrementalSnapshot,
    Meta,
    Custom,
    Plugin,
}

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Milliseconds since the Unix epoch
    pub timestamp: u64,

    /// Opaque payload
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RecordingEvent {
    pub fn new(event_type: EventType, timestamp: u64, data: serde_json::Value) -> Self {
        Self {
            event_type,
            timestamp,
            data,
        }
    }

    /// Custom event carrying a tagged payload (breadcrumbs, performance spans)
    pub fn custom(timestamp: u64, tag: &str, payload: serde_json::Value) -> Self {
        Self::new(
            EventType::Custom,
            timestamp,
            serde_json::json!({ "tag": tag, "payload": payload }),
        )
    }

    /// Full snapshots are safe restart points in the stream
    pub fn is_checkout(&self) -> bool {
        self.event_type == EventType::FullSnapshot
    }
}

/// Diagnostic view of a buffered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMarker {
    pub timestamp: u64,
    pub event_type: EventType,
    pub checkout: bool,
}

impl EventMarker {
    pub fn of(event: &RecordingEvent, checkout: bool) -> Self {
        Self {
            timestamp: event.timestamp,
            event_type: event.event_type,
            checkout,
        }
    }
}

/// Drained payload of an event buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingData {
    /// JSON array of events
    Raw(String),

    /// zstd frame holding the JSON array
    Compressed(Bytes),
}

impl RecordingData {
    /// Payload of a buffer that held no events
    pub fn empty() -> Self {
        RecordingData::Raw("[]".to_string())
    }

    pub fn len(&self) -> usize {
        match self {
            RecordingData::Raw(json) => json.len(),
            RecordingData::Compressed(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, RecordingData::Compressed(_))
    }

    /// File extension used when the payload is persisted
    pub fn extension(&self) -> &'static str {
        match self {
            RecordingData::Raw(_) => "json",
            RecordingData::Compressed(_) => "zst",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RecordingData::Raw(json) => json.as_bytes(),
            RecordingData::Compressed(bytes) => bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = RecordingEvent::new(EventType::FullSnapshot, 42, serde_json::json!({"node": 1}));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"full_snapshot","timestamp":42,"data":{"node":1}}"#);
        assert!(event.is_checkout());
    }

    #[test]
    fn test_custom_event() {
        let event = RecordingEvent::custom(7, "breadcrumb", serde_json::json!({"category": "ui.click"}));
        assert_eq!(event.event_type, EventType::Custom);
        assert_eq!(event.data["tag"], "breadcrumb");
        assert!(!event.is_checkout());
    }

    #[test]
    fn test_recording_data_views() {
        let empty = RecordingData::empty();
        assert_eq!(empty.as_bytes(), b"[]");
        assert_eq!(empty.extension(), "json");
        assert!(!empty.is_compressed());

        let compressed = RecordingData::Compressed(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(compressed.len(), 3);
        assert_eq!(compressed.extension(), "zst");
    }
}
