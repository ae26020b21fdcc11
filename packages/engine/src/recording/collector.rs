// packages/engine/src/recording/collector.rs
//! Performance entry and breadcrumb collection
//!
//! Performance-observer entries accumulate here between flushes and are
//! turned into replay spans right before the buffer is drained. Breadcrumbs
//! are converted immediately.

use crate::recording::event::RecordingEvent;
use serde::{Deserialize, Serialize};
use tracing::trace;

const PERFORMANCE_SPAN_TAG: &str = "performanceSpan";
const BREADCRUMB_TAG: &str = "breadcrumb";

/// Entry reported by the host's performance observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    /// `navigation`, `resource`, `paint`, `largest-contentful-paint` or `memory`
    pub entry_type: String,

    pub name: String,

    /// Milliseconds since the host time origin
    pub start_time: f64,

    /// Milliseconds
    #[serde(default)]
    pub duration: f64,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// Span derived from a performance entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySpan {
    pub op: String,
    pub description: String,

    /// Seconds since the Unix epoch
    pub start_timestamp: f64,
    pub end_timestamp: f64,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// Host breadcrumb (click, navigation, console message, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub category: String,

    #[serde(default)]
    pub message: Option<String>,

    /// Milliseconds since the Unix epoch
    pub timestamp: u64,

    #[serde(default)]
    pub data: serde_json::Value,
}

impl Breadcrumb {
    pub fn into_event(self) -> RecordingEvent {
        let timestamp = self.timestamp;
        let payload = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        RecordingEvent::custom(timestamp, BREADCRUMB_TAG, payload)
    }
}

/// Accumulates performance entries until the next flush
#[derive(Debug)]
pub struct PerformanceCollector {
    /// Epoch milliseconds of the host time origin
    time_origin_ms: u64,
    entries: Vec<PerformanceEntry>,
}

impl PerformanceCollector {
    pub fn new(time_origin_ms: u64) -> Self {
        Self {
            time_origin_ms,
            entries: Vec::new(),
        }
    }

    pub fn time_origin_ms(&self) -> u64 {
        self.time_origin_ms
    }

    pub fn push(&mut self, entry: PerformanceEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard entries without converting them
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Convert and clear the collected entries
    ///
    /// Entries that started before `not_before_ms` (epoch) belong to an older
    /// session and are pruned.
    pub fn drain_events(&mut self, not_before_ms: u64) -> Vec<RecordingEvent> {
        let origin = self.time_origin_ms as f64;

        std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|entry| origin + entry.start_time >= not_before_ms as f64)
            .filter_map(|entry| create_performance_span(origin, entry))
            .map(|span| {
                let timestamp = (span.start_timestamp * 1000.0) as u64;
                let payload = serde_json::to_value(&span).unwrap_or(serde_json::Value::Null);
                RecordingEvent::custom(timestamp, PERFORMANCE_SPAN_TAG, payload)
            })
            .collect()
    }
}

/// Map a performance entry to a replay span; unknown entry types yield `None`
pub fn create_performance_span(time_origin_ms: f64, entry: PerformanceEntry) -> Option<ReplaySpan> {
    let op = match entry.entry_type.as_str() {
        "navigation" => format!("navigation.{}", entry.name),
        "resource" => {
            let initiator = entry
                .data
                .get("initiatorType")
                .and_then(|v| v.as_str())
                .unwrap_or("other");
            format!("resource.{}", initiator)
        }
        "paint" => "paint".to_string(),
        "largest-contentful-paint" => "largest-contentful-paint".to_string(),
        "memory" => "memory".to_string(),
        other => {
            trace!("Skipping unsupported performance entry type {}", other);
            return None;
        }
    };

    let start = (time_origin_ms + entry.start_time) / 1000.0;
    let end = start + entry.duration / 1000.0;

    Some(ReplaySpan {
        op,
        description: entry.name,
        start_timestamp: start,
        end_timestamp: end,
        data: entry.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::event::EventType;

    fn entry(entry_type: &str, name: &str, start_time: f64) -> PerformanceEntry {
        PerformanceEntry {
            entry_type: entry_type.to_string(),
            name: name.to_string(),
            start_time,
            duration: 250.0,
            data: serde_json::json!({}),
        }
    }

    #[test]
    fn test_span_ops() {
        let nav = create_performance_span(0.0, entry("navigation", "navigate", 0.0)).unwrap();
        assert_eq!(nav.op, "navigation.navigate");

        let mut resource = entry("resource", "https://cdn.example.com/app.js", 0.0);
        resource.data = serde_json::json!({"initiatorType": "script"});
        assert_eq!(create_performance_span(0.0, resource).unwrap().op, "resource.script");

        let untyped = create_performance_span(0.0, entry("resource", "img.png", 0.0)).unwrap();
        assert_eq!(untyped.op, "resource.other");

        assert!(create_performance_span(0.0, entry("longtask", "self", 0.0)).is_none());
    }

    #[test]
    fn test_span_timestamps_are_seconds() {
        let span = create_performance_span(1_000_000.0, entry("paint", "first-paint", 500.0)).unwrap();
        assert_eq!(span.start_timestamp, 1_000.5);
        assert_eq!(span.end_timestamp, 1_000.75);
    }

    #[test]
    fn test_drain_prunes_and_clears() {
        let mut collector = PerformanceCollector::new(10_000);
        collector.push(entry("paint", "first-paint", 100.0));
        collector.push(entry("paint", "first-contentful-paint", 5_000.0));
        collector.push(entry("longtask", "self", 6_000.0));
        assert_eq!(collector.len(), 3);

        let events = collector.drain_events(12_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Custom);
        assert_eq!(events[0].timestamp, 15_000);
        assert_eq!(events[0].data["tag"], "performanceSpan");
        assert!(collector.is_empty());
    }

    #[test]
    fn test_breadcrumb_event() {
        let crumb = Breadcrumb {
            category: "ui.click".to_string(),
            message: Some("button#submit".to_string()),
            timestamp: 42,
            data: serde_json::Value::Null,
        };
        let event = crumb.into_event();
        assert_eq!(event.timestamp, 42);
        assert_eq!(event.data["tag"], "breadcrumb");
        assert_eq!(event.data["payload"]["category"], "ui.click");
    }
}
