// packages/engine/src/session/mod.rs
//! Session identity, sampling and persistence

pub mod sampler;
pub mod state;
pub mod store;

pub use sampler::Sampler;
pub use state::{Sampled, Session};
pub use store::{MemorySessionStore, SessionStore, SqliteSessionStore};
