// packages/engine/src/replay/container.rs
//! Replay orchestrator
//!
//! Owns the session, the event buffer and the flush schedule. Every method
//! takes `&mut self`, so a flush can never interleave with another drain of
//! the same buffer; [`crate::replay::ReplayHandle`] serializes callers onto
//! one task.

use crate::observability::{
    EVENTS_RECORDED, FLUSH_SKIPPED, SEGMENTS_SENT, SEGMENT_BYTES, SESSIONS_CREATED,
    TRANSPORT_FAILURES, WORKER_FALLBACKS,
};
use crate::recording::buffer::{create_event_buffer, EventBuffer, InMemoryEventBuffer};
use crate::recording::collector::{Breadcrumb, PerformanceCollector, PerformanceEntry};
use crate::recording::event::{RecordingData, RecordingEvent};
use crate::replay::context::InternalEventContext;
use crate::replay::scheduler::FlushScheduler;
use crate::replay::transport::{ReplayTransport, SendReplayData};
use crate::session::{Sampled, Sampler, Session, SessionStore};
use crate::utils::clock::Clock;
use crate::utils::config::{ExpiryPolicy, ReplayPluginOptions, SessionOptions};
use crate::utils::errors::{BufferError, ConfigError, ReplayError, Result};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// Not started, or the session is not sampled
    Uninitialized,
    Recording,

    /// Intake suspended; buffered events are kept
    Paused,
    Stopped,
}

/// Result of a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Segment acknowledged by the transport
    Sent { segment_id: u32 },

    /// Nothing buffered and no context to report
    Skipped,

    /// Container is not recording a sampled session
    Inactive,
}

/// Session replay orchestrator
pub struct ReplayContainer {
    options: ReplayPluginOptions,
    state: ReplayState,
    session: Option<Session>,
    sampler: Sampler,
    buffer: Box<dyn EventBuffer>,
    context: InternalEventContext,
    performance: PerformanceCollector,
    scheduler: FlushScheduler,
    transport: Arc<dyn ReplayTransport>,
    store: Option<Arc<dyn SessionStore>>,
    clock: Arc<dyn Clock>,
}

impl ReplayContainer {
    /// Container over an explicit buffer strategy
    pub fn new(
        options: ReplayPluginOptions,
        buffer: Box<dyn EventBuffer>,
        transport: Arc<dyn ReplayTransport>,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        options.validate()?;

        let now = clock.now_ms();

        Ok(Self {
            sampler: Sampler::new(options.sample_rates()),
            scheduler: FlushScheduler::new(options.flush_min_delay(), options.flush_max_delay()),
            state: ReplayState::Uninitialized,
            session: None,
            buffer,
            context: InternalEventContext::new(now),
            performance: PerformanceCollector::new(now),
            transport,
            store: None,
            clock,
            options,
        })
    }

    /// Container whose buffer strategy follows `use_compression`
    pub async fn create(
        options: ReplayPluginOptions,
        transport: Arc<dyn ReplayTransport>,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        options.validate()?;
        let buffer = create_event_buffer(&options).await;
        Self::new(options, buffer, transport, clock)
    }

    /// Persist sessions through `store` when sticky sessions are enabled
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn options(&self) -> &ReplayPluginOptions {
        &self.options
    }

    pub fn context(&self) -> &InternalEventContext {
        &self.context
    }

    pub fn pending_length(&self) -> usize {
        self.buffer.pending_length()
    }

    pub fn is_compressed(&self) -> bool {
        self.buffer.is_compressed()
    }

    /// Recording or paused on a sampled session
    pub fn is_enabled(&self) -> bool {
        matches!(self.state, ReplayState::Recording | ReplayState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state == ReplayState::Paused
    }

    /// Deadline of the pending debounced flush
    pub fn next_flush_deadline(&self) -> Option<Instant> {
        if self.state == ReplayState::Recording {
            self.scheduler.next_deadline()
        } else {
            None
        }
    }

    fn session_options(&self) -> SessionOptions {
        self.options.session_options()
    }

    /// Create or restore the session and begin recording
    ///
    /// An unsampled session leaves the container inert until an error upgrade.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            ReplayState::Stopped => return Err(ReplayError::ContainerClosed),
            _ if self.session.is_some() => return Ok(()),
            _ => {}
        }

        let now = self.clock.now_ms();
        let restored = self.load_session().await;

        let session = match restored {
            Some(session) if !session.is_expired(now, &self.session_options()) => {
                info!(
                    "Restored session {} at segment {} ({})",
                    session.id,
                    session.segment_id,
                    session.sampled().as_str()
                );
                session
            }
            Some(expired) => self.new_session(now, Some(expired.id)),
            None => self.new_session(now, None),
        };

        self.context = InternalEventContext::new(now);
        self.state = if session.sampled().is_sampled() {
            ReplayState::Recording
        } else {
            ReplayState::Uninitialized
        };
        self.session = Some(session);
        self.persist_session().await;

        match self.state {
            ReplayState::Recording => info!("Replay recording started"),
            _ => info!("Session not sampled; replay stays inert until an error"),
        }

        Ok(())
    }

    fn new_session(&mut self, now: u64, previous_session_id: Option<String>) -> Session {
        let session = Session::create(now, self.sampler.sample_session(), previous_session_id);
        metrics::counter!(SESSIONS_CREATED).increment(1);
        info!("Created session {} ({})", session.id, session.sampled().as_str());
        session
    }

    async fn load_session(&self) -> Option<Session> {
        if !self.options.sticky_session {
            return None;
        }
        let store = self.store.as_ref()?;

        match store.load().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to load sticky session, starting fresh: {}", e);
                None
            }
        }
    }

    async fn persist_session(&self) {
        if !self.options.sticky_session {
            return;
        }
        let (Some(store), Some(session)) = (self.store.as_ref(), self.session.as_ref()) else {
            return;
        };

        if let Err(e) = store.save(session).await {
            warn!("Failed to persist session {}: {}", session.id, e);
        }
    }

    /// Suspend intake; buffered events stay and no flush fires while paused
    pub fn pause(&mut self) {
        if self.state != ReplayState::Recording {
            return;
        }
        self.scheduler.cancel();
        self.state = ReplayState::Paused;
        info!("Replay paused with {} buffered events", self.buffer.pending_length());
    }

    pub fn resume(&mut self) {
        if self.state != ReplayState::Paused {
            return;
        }
        self.state = ReplayState::Recording;
        if self.buffer.pending_length() > 0 || self.context.is_dirty() {
            self.scheduler.on_update(Instant::now());
        }
        info!("Replay resumed");
    }

    /// Final best-effort flush, then release the buffer
    pub async fn stop(&mut self) -> Result<()> {
        if self.state == ReplayState::Stopped {
            return Ok(());
        }

        self.scheduler.cancel();

        if self.is_enabled() {
            if let Err(e) = self.flush().await {
                warn!("Final flush failed: {}", e);
            }
        }

        self.buffer.destroy();
        self.performance.clear();
        self.state = ReplayState::Stopped;
        self.persist_session().await;

        info!("Replay stopped");

        Ok(())
    }

    /// Register a change; `cb` returning `true` (re)schedules a flush
    ///
    /// Ignored unless the container is enabled. While paused the update is
    /// applied but nothing is scheduled.
    pub fn add_update<F>(&mut self, cb: F)
    where
        F: FnOnce(&mut Self) -> bool,
    {
        if !self.is_enabled() {
            return;
        }

        if cb(self) && self.state == ReplayState::Recording {
            self.scheduler.on_update(Instant::now());
        }
    }

    /// Buffer a recorded event
    ///
    /// Returns `false` when the event was not taken because the container is
    /// not recording. A worker failure moves the container to the in-memory
    /// buffer and the event is retried there.
    pub async fn add_event(&mut self, event: RecordingEvent, is_checkout: bool) -> Result<bool> {
        if self.state != ReplayState::Recording {
            return Ok(false);
        }

        let timestamp = event.timestamp;
        let retry = self.buffer.is_compressed().then(|| event.clone());

        if let Err(e) = self.buffer.add_event(event, is_checkout).await {
            match retry {
                Some(event) if matches!(e, BufferError::Worker(_)) => {
                    self.fall_back_to_in_memory(&e);
                    self.buffer.add_event(event, is_checkout).await?;
                }
                _ => return Err(e.into()),
            }
        }

        self.context.note_event(timestamp);
        metrics::counter!(EVENTS_RECORDED).increment(1);

        self.add_update(|_| true);

        Ok(true)
    }

    fn fall_back_to_in_memory(&mut self, cause: &BufferError) {
        warn!(
            "Compression worker failed ({}), dropping {} worker-held events and continuing uncompressed",
            cause,
            self.buffer.pending_length()
        );
        self.buffer.destroy();
        self.buffer = Box::new(InMemoryEventBuffer::new());
        metrics::counter!(WORKER_FALLBACKS).increment(1);
    }

    /// Drain the buffer and hand the segment to the transport
    ///
    /// A transport failure drops the drained payload and leaves the segment
    /// counter and the context untouched.
    pub async fn flush(&mut self) -> Result<FlushOutcome> {
        self.scheduler.cancel();

        if !self.is_enabled() {
            return Ok(FlushOutcome::Inactive);
        }
        let Some(started) = self.session.as_ref().map(|s| s.started) else {
            return Ok(FlushOutcome::Inactive);
        };

        for span in self.performance.drain_events(started) {
            if let Err(e) = self.buffer.add_event(span, false).await {
                debug!("Dropping performance span: {}", e);
            }
        }

        let event_count = self.buffer.pending_length();
        let recording_data = match self.buffer.finish().await {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to finish segment with {} events: {}", event_count, e);
                if matches!(e, BufferError::Worker(_)) {
                    self.fall_back_to_in_memory(&e);
                }
                RecordingData::empty()
            }
        };

        if event_count == 0 && !self.context.is_dirty() {
            metrics::counter!(FLUSH_SKIPPED).increment(1);
            debug!("Nothing to flush");
            return Ok(FlushOutcome::Skipped);
        }

        let Some(session) = self.session.clone() else {
            return Err(ReplayError::NoSession);
        };
        let segment_id = session.segment_id;
        let payload_bytes = recording_data.len();

        let data = SendReplayData {
            recording_data,
            replay_id: session.id.clone(),
            segment_id,
            include_replay_start_timestamp: segment_id == 0,
            event_context: self.context.snapshot(),
            timestamp: self.clock.now_ms(),
            session,
            options: self.options.clone(),
        };

        if let Err(e) = self.transport.send_replay(data).await {
            metrics::counter!(TRANSPORT_FAILURES).increment(1);
            error!("Failed to send replay segment {}: {}", segment_id, e);
            return Err(e.into());
        }

        let now = self.clock.now_ms();
        if let Some(session) = self.session.as_mut() {
            session.advance_segment();
            session.touch(now);
        }
        self.context.reset_segment();
        self.persist_session().await;

        metrics::counter!(SEGMENTS_SENT).increment(1);
        metrics::histogram!(SEGMENT_BYTES).record(payload_bytes as f64);
        debug!(
            "Sent segment {} ({} events, {} bytes)",
            segment_id, event_count, payload_bytes
        );

        Ok(FlushOutcome::Sent { segment_id })
    }

    /// Cancel pending timers and flush now (page hide, unload)
    pub async fn flush_immediate(&mut self) -> Result<FlushOutcome> {
        self.scheduler.cancel();
        self.flush().await
    }

    fn is_session_expired(&self, now: u64) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| session.is_expired(now, &self.session_options()))
    }

    /// Replace an expired session; returns whether it was rotated
    ///
    /// Events still buffered for the expired session are discarded, never
    /// sent under the new one.
    pub async fn check_and_handle_expired_session(&mut self) -> bool {
        let now = self.clock.now_ms();
        if !self.is_session_expired(now) {
            return false;
        }
        self.rotate_session(now).await;
        true
    }

    async fn rotate_session(&mut self, now: u64) {
        let previous = self.session.take().map(|session| session.id);

        self.scheduler.cancel();
        let discarded = self.buffer.pending_length();
        if let Err(e) = self.buffer.finish().await {
            debug!("Failed to drain buffer of expired session: {}", e);
        }
        if discarded > 0 {
            debug!("Discarded {} events of expired session", discarded);
        }
        self.performance.clear();
        self.context = InternalEventContext::new(now);

        let session = self.new_session(now, previous);
        self.state = match self.state {
            ReplayState::Stopped => ReplayState::Stopped,
            _ if !session.sampled().is_sampled() => ReplayState::Uninitialized,
            // A host pause outlives the session it was issued against
            ReplayState::Paused => ReplayState::Paused,
            _ => ReplayState::Recording,
        };
        self.session = Some(session);
        self.persist_session().await;
    }

    /// Apply the expiry policy, then rotate an expired session
    async fn expire_with_policy(&mut self, now: u64) -> bool {
        if !self.is_session_expired(now) {
            return false;
        }

        if self.options.expiry_policy == ExpiryPolicy::FlushUnderOldSession && self.is_enabled() {
            if let Err(e) = self.flush().await {
                warn!("Failed to flush expiring session: {}", e);
            }
        }

        self.rotate_session(now).await;
        true
    }

    /// User activity: expiry check, then refresh the activity clock
    ///
    /// Returns whether the session was rotated. Activity does not resume a
    /// paused container.
    pub async fn trigger_user_activity(&mut self) -> bool {
        if self.state == ReplayState::Stopped || self.session.is_none() {
            return false;
        }

        let now = self.clock.now_ms();
        if self.expire_with_policy(now).await {
            return true;
        }

        if let Some(session) = self.session.as_mut() {
            session.touch(now);
        }
        self.persist_session().await;
        false
    }

    /// An error occurred in the host
    ///
    /// An unsampled session may be upgraded to error sampling, which starts
    /// recording. The ids are added to the segment context.
    pub async fn handle_error_event(&mut self, error_id: &str, trace_id: Option<&str>) {
        if self.state == ReplayState::Stopped {
            return;
        }

        let upgrade = match self.session.as_ref() {
            Some(session) => session.sampled() == Sampled::NotSampled,
            None => return,
        };

        if upgrade && self.sampler.sample_error() {
            let upgraded = self
                .session
                .as_mut()
                .map_or(false, |session| session.upgrade_to_error_sampling());

            if upgraded {
                info!("Session upgraded to error sampling by error {}", error_id);
                if self.state == ReplayState::Uninitialized {
                    self.state = ReplayState::Recording;
                }
                self.persist_session().await;
            }
        }

        self.add_update(|container| {
            container.context.add_error_id(error_id);
            if let Some(trace_id) = trace_id {
                container.context.add_trace_id(trace_id);
            }
            true
        });
    }

    /// A finished transaction; its trace id joins the segment context
    pub fn handle_transaction_event(&mut self, trace_id: &str) {
        self.add_update(|container| {
            container.context.add_trace_id(trace_id);
            false
        });
    }

    pub fn handle_navigation(&mut self, url: &str) {
        self.add_update(|container| {
            container.context.add_url(url);
            false
        });
    }

    /// Collected until the next flush, then converted to spans
    pub fn add_performance_entry(&mut self, entry: PerformanceEntry) {
        if self.state != ReplayState::Recording {
            return;
        }
        self.add_update(|container| {
            container.performance.push(entry);
            false
        });
    }

    pub async fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) -> Result<bool> {
        self.add_event(breadcrumb.into_event(), false).await
    }

    /// Hidden flushes right away; visible checks for expiry
    pub async fn handle_visibility_change(&mut self, hidden: bool) -> Result<()> {
        if hidden {
            self.flush_immediate().await?;
        } else {
            let now = self.clock.now_ms();
            if self.session.is_some() && self.state != ReplayState::Stopped {
                self.expire_with_policy(now).await;
            }
        }
        Ok(())
    }

    pub async fn handle_window_blur(&mut self) -> Result<()> {
        self.flush_immediate().await?;
        Ok(())
    }

    pub async fn handle_window_focus(&mut self) -> bool {
        self.trigger_user_activity().await
    }
}

impl Drop for ReplayContainer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}
