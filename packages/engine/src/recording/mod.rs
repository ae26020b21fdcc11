// packages/engine/src/recording/mod.rs
//! Event recording and buffering
//!
//! - **Event**: Recorded event, marker and payload types
//! - **Event Queue**: Bounded lock-free intake queue
//! - **Buffer**: In-memory and worker-compressed event buffers
//! - **Compressor**: zstd one-shot and streaming compression
//! - **Collector**: Performance entries and breadcrumbs
//! - **Storage**: SQLite + file system segment storage
//!
//! # Architecture
//!
//! ```text
//! Recorder → record_event() → Bounded Queue → EventBuffer
//!                                                 ↓
//!                                  in-memory  or  worker (zstd stream)
//!                                                 ↓
//!                                      finish() → RecordingData
//! ```

pub mod buffer;
pub mod collector;
pub mod compressor;
pub mod event;
pub mod event_queue;
pub mod storage;

// Re-export commonly used types
pub use buffer::{create_event_buffer, EventBuffer};
pub use collector::{Breadcrumb, PerformanceCollector, PerformanceEntry};
pub use compressor::{CompressionLevel, Compressor};
pub use event::{EventMarker, EventType, RecordingData, RecordingEvent};
pub use event_queue::{EventQueue, QueueStats};
pub use storage::{StorageConfig, StorageTransport};
