// packages/engine/src/worker/mod.rs
//! Background compression worker
//!
//! ```text
//! EventBuffer ──WorkerRequest{id}──▶ worker thread (zstd stream)
//!      ▲                                   │
//!      └────── pending[id] ◀──WorkerResponse{id}
//! ```

pub mod bridge;
pub mod compression;
pub mod protocol;

pub use bridge::WorkerBridge;
pub use protocol::{WorkerMethod, WorkerPayload, WorkerRequest, WorkerResponse};
