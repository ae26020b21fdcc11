// packages/engine/src/lib.rs
//! Session Replay Recording Engine
//!
//! Captures a stream of UI interaction events, buffers them (optionally
//! compressed on a background worker), manages a sampled, resumable session
//! and flushes segments to a transport on a debounced schedule.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **recording**: Event types, intake queue, buffers, compression, segment storage
//! - **worker**: Compression worker and the request/response bridge to it
//! - **session**: Session record, sampling, sticky persistence
//! - **replay**: Orchestrator, flush scheduling, transport contract
//! - **observability**: Metrics, tracing, and logging
//! - **utils**: Configuration, errors, clock

// Public module exports
pub mod observability;
pub mod recording;
pub mod replay;
pub mod session;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use recording::{EventType, RecordingData, RecordingEvent};
pub use replay::{FlushOutcome, ReplayContainer, ReplayHandle, ReplayState, ReplayTransport, SendReplayData};
pub use session::{Sampled, Session};
pub use utils::config::{ReplayConfig, ReplayPluginOptions};
pub use utils::errors::{ReplayError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
