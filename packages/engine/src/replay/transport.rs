// packages/engine/src/replay/transport.rs
//! Outbound segment contract

use crate::recording::event::RecordingData;
use crate::replay::context::PopEventContext;
use crate::session::Session;
use crate::utils::config::ReplayPluginOptions;
use crate::utils::errors::TransportError;
use async_trait::async_trait;

/// One segment handed to the transport
#[derive(Debug, Clone)]
pub struct SendReplayData {
    pub recording_data: RecordingData,
    pub replay_id: String,
    pub segment_id: u32,

    /// Set only for segment 0 of a session
    pub include_replay_start_timestamp: bool,

    pub event_context: PopEventContext,

    /// Send time (epoch ms)
    pub timestamp: u64,

    /// Session as of the send, before the segment counter advances
    pub session: Session,

    pub options: ReplayPluginOptions,
}

/// Delivers segments to the backend
///
/// Retries and backoff belong to the implementation; the container never
/// resends a segment.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    /// Returns once the segment is acknowledged
    async fn send_replay(&self, data: SendReplayData) -> Result<(), TransportError>;
}
