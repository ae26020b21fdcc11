// packages/engine/src/utils/errors.rs
//! Error types for the replay engine
//!
//! Every asynchronous boundary in the pipeline terminates in one of these
//! classified errors. Component errors convert into [`ReplayError`] so callers
//! can use `?` across layers.

use thiserror::Error;

/// Failure while adding to or draining an event buffer
#[derive(Error, Debug)]
pub enum BufferError {
    /// Event could not be serialized
    #[error("failed to serialize recording event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The compression worker rejected or lost the request
    #[error("compression worker failed: {0}")]
    Worker(#[from] WorkerError),

    /// Compression or finalization of the payload failed
    #[error("failed to compress recording data: {0}")]
    Compression(String),

    /// Buffer was used after `destroy()`
    #[error("event buffer has been destroyed")]
    Destroyed,
}

/// Failure of a call over the compression worker bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Worker thread could not be started
    #[error("failed to spawn compression worker: {0}")]
    Spawn(String),

    /// Bridge has been torn down, or the worker is gone
    #[error("compression worker is unreachable")]
    Unreachable,

    /// Worker answered with `success = false`
    #[error("worker call '{method}' failed: {detail}")]
    Failed {
        /// Method that was invoked
        method: String,
        /// Error payload carried by the response
        detail: String,
    },

    /// No response arrived within the request timeout
    #[error("worker call '{0}' timed out")]
    Timeout(String),
}

/// Failure reported by the transport collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Backend rejected the segment
    #[error("replay segment {segment_id} rejected: {reason}")]
    Rejected {
        /// Segment that was being sent
        segment_id: u32,
        /// Reason reported by the backend
        reason: String,
    },

    /// Delivery failed before an acknowledgment was received
    #[error("replay segment delivery failed: {0}")]
    Delivery(String),
}

/// Failure reading or writing the persisted sticky session
#[derive(Error, Debug)]
pub enum SessionStorageError {
    /// Underlying database failed
    #[error("session store query failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// Persisted record could not be decoded
    #[error("persisted session is corrupt: {0}")]
    Corrupt(String),

    /// Store directory could not be prepared
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration sources could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is outside its allowed range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level engine error
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    SessionStorage(#[from] SessionStorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Segment storage failed
    #[error("segment storage failed: {0}")]
    StorageFailed(String),

    /// Operation requires a session but none is loaded
    #[error("no active replay session")]
    NoSession,

    /// Orchestrator task is no longer running
    #[error("replay container has shut down")]
    ContainerClosed,
}

/// Engine result type
pub type Result<T> = std::result::Result<T, ReplayError>;
