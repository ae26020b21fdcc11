// packages/engine/src/replay/context.rs
//! Event context accumulated per segment
//!
//! Error and trace ids are tracked as sets while a segment accumulates and
//! converted to sorted arrays when the segment is handed to the transport.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Context accumulated while a segment is being recorded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternalEventContext {
    /// Errors observed during the segment
    pub error_ids: HashSet<String>,

    /// Traces observed during the segment
    pub trace_ids: HashSet<String>,

    /// URLs visited during the segment, in visit order
    pub urls: Vec<String>,

    /// Earliest timestamp of an event buffered for the segment
    pub earliest_event: Option<u64>,

    /// First URL seen in the session
    pub initial_url: Option<String>,

    /// Session recording start (epoch ms)
    pub initial_timestamp: u64,
}

impl InternalEventContext {
    /// Fresh context for a session starting at `initial_timestamp`
    pub fn new(initial_timestamp: u64) -> Self {
        Self {
            initial_timestamp,
            ..Default::default()
        }
    }

    pub fn add_error_id(&mut self, error_id: impl Into<String>) {
        self.error_ids.insert(error_id.into());
    }

    pub fn add_trace_id(&mut self, trace_id: impl Into<String>) {
        self.trace_ids.insert(trace_id.into());
    }

    pub fn add_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if self.initial_url.is_none() {
            self.initial_url = Some(url.clone());
        }
        if self.urls.last() != Some(&url) {
            self.urls.push(url);
        }
    }

    /// Track the earliest buffered event
    pub fn note_event(&mut self, timestamp: u64) {
        self.earliest_event = Some(match self.earliest_event {
            Some(earliest) => earliest.min(timestamp),
            None => timestamp,
        });
    }

    /// Whether anything besides events would be lost by skipping a flush
    pub fn is_dirty(&self) -> bool {
        !self.error_ids.is_empty() || !self.trace_ids.is_empty() || !self.urls.is_empty()
    }

    /// Array form handed to the transport; the context is unchanged
    pub fn snapshot(&self) -> PopEventContext {
        let mut error_ids: Vec<String> = self.error_ids.iter().cloned().collect();
        let mut trace_ids: Vec<String> = self.trace_ids.iter().cloned().collect();
        error_ids.sort();
        trace_ids.sort();

        PopEventContext {
            error_ids,
            trace_ids,
            urls: self.urls.clone(),
            earliest_event: self.earliest_event,
            initial_url: self.initial_url.clone(),
            initial_timestamp: self.initial_timestamp,
        }
    }

    /// Clear the per-segment fields after a segment was acknowledged
    ///
    /// `initial_url` and `initial_timestamp` belong to the session and survive.
    pub fn reset_segment(&mut self) {
        self.error_ids.clear();
        self.trace_ids.clear();
        self.urls.clear();
        self.earliest_event = None;
    }
}

/// Event context as sent with a segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopEventContext {
    pub error_ids: Vec<String>,
    pub trace_ids: Vec<String>,
    pub urls: Vec<String>,
    pub earliest_event: Option<u64>,
    pub initial_url: Option<String>,
    pub initial_timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_deduplicated_and_sorted() {
        let mut context = InternalEventContext::new(100);
        context.add_error_id("err-b");
        context.add_error_id("err-a");
        context.add_error_id("err-b");
        context.add_trace_id("trace-1");

        let popped = context.snapshot();
        assert_eq!(popped.error_ids, vec!["err-a", "err-b"]);
        assert_eq!(popped.trace_ids, vec!["trace-1"]);
        assert_eq!(popped.initial_timestamp, 100);
    }

    #[test]
    fn test_urls_keep_visit_order() {
        let mut context = InternalEventContext::new(0);
        context.add_url("https://example.com/b");
        context.add_url("https://example.com/b");
        context.add_url("https://example.com/a");

        assert_eq!(context.initial_url.as_deref(), Some("https://example.com/b"));
        assert_eq!(context.urls, vec!["https://example.com/b", "https://example.com/a"]);
    }

    #[test]
    fn test_earliest_event() {
        let mut context = InternalEventContext::new(0);
        assert_eq!(context.earliest_event, None);
        context.note_event(50);
        context.note_event(20);
        context.note_event(70);
        assert_eq!(context.earliest_event, Some(20));
    }

    #[test]
    fn test_reset_segment_keeps_session_fields() {
        let mut context = InternalEventContext::new(10);
        context.add_url("https://example.com/");
        context.add_error_id("err");
        context.note_event(11);
        assert!(context.is_dirty());

        context.reset_segment();
        assert!(!context.is_dirty());
        assert_eq!(context.earliest_event, None);
        assert_eq!(context.initial_url.as_deref(), Some("https://example.com/"));
        assert_eq!(context.initial_timestamp, 10);
    }

    #[test]
    fn test_pop_context_wire_names() {
        let mut context = InternalEventContext::new(1);
        context.add_error_id("e1");
        let json = serde_json::to_value(context.snapshot()).unwrap();
        assert_eq!(json["errorIds"], serde_json::json!(["e1"]));
        assert_eq!(json["traceIds"], serde_json::json!([]));
        assert_eq!(json["initialTimestamp"], 1);
    }
}
