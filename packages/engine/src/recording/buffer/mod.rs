// packages/engine/src/recording/buffer/mod.rs
//! Event buffers
//!
//! Two interchangeable strategies accumulate recorded events between
//! flushes:
//!
//! - **InMemoryEventBuffer**: keeps events resident, serializes on finish
//! - **CompressionWorkerEventBuffer**: streams events to the compression
//!   worker, which holds the incremental zstd state
//!
//! The container only sees [`EventBuffer`]; [`create_event_buffer`] picks the
//! strategy from configuration and falls back to the in-memory buffer when
//! the worker cannot be started.

pub mod compression_worker;
pub mod in_memory;

use crate::observability::WORKER_FALLBACKS;
use crate::recording::compressor::CompressionLevel;
use crate::recording::event::{EventMarker, RecordingData, RecordingEvent};
use crate::utils::config::ReplayPluginOptions;
use crate::utils::errors::BufferError;
use crate::worker::WorkerBridge;
use async_trait::async_trait;
use tracing::{info, warn};

pub use compression_worker::CompressionWorkerEventBuffer;
pub use in_memory::InMemoryEventBuffer;

/// Accumulates recorded events until the next flush
#[async_trait]
pub trait EventBuffer: Send + Sync {
    /// Number of events added since the last finish
    fn pending_length(&self) -> usize;

    /// Logical order of the events added since the last finish
    fn pending_events(&self) -> &[EventMarker];

    /// Index into `pending_events` of the most recent checkout event
    fn last_checkout(&self) -> Option<usize>;

    /// Whether finish produces a compressed payload
    fn is_compressed(&self) -> bool;

    /// Append an event
    ///
    /// A checkout event marks a safe restart point; it is appended like any
    /// other event and never replaces earlier ones.
    async fn add_event(&mut self, event: RecordingEvent, is_checkout: bool) -> Result<(), BufferError>;

    /// Drain the buffer and return its payload
    ///
    /// Returns an empty payload when nothing was added. The buffer is empty
    /// afterwards, even when this fails.
    async fn finish(&mut self) -> Result<RecordingData, BufferError>;

    /// Release worker handles; the buffer is unusable afterwards. Idempotent.
    fn destroy(&mut self);

    /// Timestamp of the earliest pending event
    fn earliest_timestamp(&self) -> Option<u64> {
        self.pending_events().iter().map(|m| m.timestamp).min()
    }
}

/// Build the buffer strategy selected by `options`
pub async fn create_event_buffer(options: &ReplayPluginOptions) -> Box<dyn EventBuffer> {
    if options.use_compression {
        match WorkerBridge::spawn(CompressionLevel::Balanced, options.worker_request_timeout()) {
            Ok(bridge) => {
                let buffer = CompressionWorkerEventBuffer::new(bridge);
                match buffer.ensure_ready().await {
                    Ok(()) => {
                        info!("Using compression worker event buffer");
                        return Box::new(buffer);
                    }
                    Err(e) => warn!("Compression worker failed to initialize: {}", e),
                }
            }
            Err(e) => warn!("Compression worker unavailable: {}", e),
        }

        metrics::counter!(WORKER_FALLBACKS).increment(1);
    }

    info!("Using in-memory event buffer");
    Box::new(InMemoryEventBuffer::new())
}
