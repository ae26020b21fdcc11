// packages/engine/src/replay/mod.rs
//! Replay orchestration
//!
//! - **ReplayContainer**: owns the session and buffer, decides when and what to flush
//! - **FlushScheduler**: debounce-with-ceiling deadlines
//! - **ReplayHandle**: runs a container on its own task
//! - **ReplayTransport**: where finished segments go
//!
//! # Architecture
//!
//! ```text
//! record_event() → Bounded Queue → Replay Task → EventBuffer.add_event
//!                                       ↓ (min/max delay)
//!                                   flush(): EventBuffer.finish
//!                                       ↓
//!                              ReplayTransport.send_replay
//! ```

pub mod container;
pub mod context;
pub mod handle;
pub mod scheduler;
pub mod transport;

pub use container::{FlushOutcome, ReplayContainer, ReplayState};
pub use context::{InternalEventContext, PopEventContext};
pub use handle::{ReplayHandle, ReplayStatus};
pub use scheduler::FlushScheduler;
pub use transport::{ReplayTransport, SendReplayData};
