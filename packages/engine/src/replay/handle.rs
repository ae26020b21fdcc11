// packages/engine/src/replay/handle.rs
//! Task that owns a replay container
//!
//! Recorded events go through a bounded lock-free queue so producers never
//! block; everything else arrives as a command. The task drains the queue
//! before each command, so a command observes every event enqueued before it.
//! Pausing takes effect at the producer: once `pause()` returns, new events
//! are refused until `resume()`.
//! Debounce deadlines are awaited with `sleep_until`, and a flush runs to
//! completion inside the task: a flush requested meanwhile waits in the
//! channel and runs afterwards.

use crate::recording::collector::{Breadcrumb, PerformanceEntry};
use crate::recording::event::RecordingEvent;
use crate::recording::event_queue::{EventQueue, QueueStats, QueuedEvent};
use crate::replay::container::{FlushOutcome, ReplayContainer, ReplayState};
use crate::session::Session;
use crate::utils::errors::{ReplayError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Snapshot of the container for diagnostics
#[derive(Debug, Clone)]
pub struct ReplayStatus {
    pub state: ReplayState,
    pub session: Option<Session>,
    pub pending_events: usize,
    pub queue: QueueStats,
}

enum Command {
    Start(oneshot::Sender<Result<()>>),
    Pause,
    Resume,
    Flush(oneshot::Sender<Result<FlushOutcome>>),
    FlushImmediate(oneshot::Sender<Result<FlushOutcome>>),
    Activity,
    Error {
        error_id: String,
        trace_id: Option<String>,
    },
    Transaction(String),
    Navigation(String),
    Performance(PerformanceEntry),
    Breadcrumb(Breadcrumb),
    Visibility {
        hidden: bool,
    },
    Blur,
    Focus,
    Status(oneshot::Sender<ReplayStatus>),
    Stop(oneshot::Sender<Result<()>>),
}

/// Cloneable handle to a running container
#[derive(Clone)]
pub struct ReplayHandle {
    commands: mpsc::UnboundedSender<Command>,
    queue: Arc<EventQueue>,
    notify: Arc<Notify>,
    paused: Arc<AtomicBool>,
}

impl ReplayHandle {
    /// Move `container` into a new task; must be called inside a runtime
    pub fn spawn(container: ReplayContainer) -> (Self, JoinHandle<()>) {
        let queue = Arc::new(EventQueue::new(container.options().max_queue_size));
        let notify = Arc::new(Notify::new());
        let (commands, receiver) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(container, receiver, queue.clone(), notify.clone()));

        (
            Self {
                commands,
                queue,
                notify,
                paused: Arc::new(AtomicBool::new(false)),
            },
            task,
        )
    }

    /// Enqueue a recorded event; `false` if paused or the queue was full
    pub fn record_event(&self, event: RecordingEvent) -> bool {
        let is_checkout = event.is_checkout();
        self.record(event, is_checkout)
    }

    /// Enqueue an event with an explicit checkout flag
    pub fn record(&self, event: RecordingEvent, is_checkout: bool) -> bool {
        if self.paused.load(Ordering::SeqCst) {
            return false;
        }
        let accepted = self.queue.push(QueuedEvent { event, is_checkout }).is_ok();
        if accepted {
            self.notify.notify_one();
        }
        accepted
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ReplayError::ContainerClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx))?;
        rx.await.map_err(|_| ReplayError::ContainerClosed)
    }

    pub async fn start(&self) -> Result<()> {
        self.request(Command::Start).await?
    }

    pub fn pause(&self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        self.send(Command::Resume)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub async fn flush(&self) -> Result<FlushOutcome> {
        self.request(Command::Flush).await?
    }

    pub async fn flush_immediate(&self) -> Result<FlushOutcome> {
        self.request(Command::FlushImmediate).await?
    }

    pub fn trigger_user_activity(&self) -> Result<()> {
        self.send(Command::Activity)
    }

    pub fn handle_error_event(&self, error_id: impl Into<String>, trace_id: Option<String>) -> Result<()> {
        self.send(Command::Error {
            error_id: error_id.into(),
            trace_id,
        })
    }

    pub fn handle_transaction_event(&self, trace_id: impl Into<String>) -> Result<()> {
        self.send(Command::Transaction(trace_id.into()))
    }

    pub fn handle_navigation(&self, url: impl Into<String>) -> Result<()> {
        self.send(Command::Navigation(url.into()))
    }

    pub fn add_performance_entry(&self, entry: PerformanceEntry) -> Result<()> {
        self.send(Command::Performance(entry))
    }

    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) -> Result<()> {
        self.send(Command::Breadcrumb(breadcrumb))
    }

    pub fn handle_visibility_change(&self, hidden: bool) -> Result<()> {
        self.send(Command::Visibility { hidden })
    }

    pub fn handle_window_blur(&self) -> Result<()> {
        self.send(Command::Blur)
    }

    pub fn handle_window_focus(&self) -> Result<()> {
        self.send(Command::Focus)
    }

    pub async fn status(&self) -> Result<ReplayStatus> {
        self.request(Command::Status).await
    }

    /// Final flush and shutdown; later calls fail with `ContainerClosed`
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await?
    }
}

async fn run(
    mut container: ReplayContainer,
    mut commands: mpsc::UnboundedReceiver<Command>,
    queue: Arc<EventQueue>,
    notify: Arc<Notify>,
) {
    info!("Replay task started");

    loop {
        let deadline = container.next_flush_deadline();

        tokio::select! {
            biased;

            command = commands.recv() => {
                match command {
                    // Queued events were pushed after resume() and belong to the resumed recording
                    Some(Command::Resume) => {
                        container.resume();
                        drain_queue(&mut container, &queue).await;
                    }
                    Some(command) => {
                        drain_queue(&mut container, &queue).await;
                        if !handle_command(&mut container, &queue, command).await {
                            break;
                        }
                    }
                    None => {
                        drain_queue(&mut container, &queue).await;
                        debug!("All replay handles dropped");
                        if let Err(e) = container.stop().await {
                            warn!("Failed to stop replay container: {}", e);
                        }
                        break;
                    }
                }
            }

            _ = notify.notified() => {
                drain_queue(&mut container, &queue).await;
            }

            _ = wait_for(deadline) => {
                drain_queue(&mut container, &queue).await;
                if let Err(e) = container.flush().await {
                    warn!("Scheduled flush failed: {}", e);
                }
            }
        }
    }

    info!("Replay task stopped");
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn drain_queue(container: &mut ReplayContainer, queue: &EventQueue) {
    while let Some(QueuedEvent { event, is_checkout }) = queue.try_pop() {
        if let Err(e) = container.add_event(event, is_checkout).await {
            warn!("Failed to buffer recorded event: {}", e);
        }
    }
}

/// Returns `false` once the task should exit
async fn handle_command(container: &mut ReplayContainer, queue: &EventQueue, command: Command) -> bool {
    match command {
        Command::Start(reply) => {
            let _ = reply.send(container.start().await);
        }
        Command::Pause => container.pause(),
        Command::Resume => container.resume(),
        Command::Flush(reply) => {
            let _ = reply.send(container.flush().await);
        }
        Command::FlushImmediate(reply) => {
            let _ = reply.send(container.flush_immediate().await);
        }
        Command::Activity => {
            container.trigger_user_activity().await;
        }
        Command::Error { error_id, trace_id } => {
            container.handle_error_event(&error_id, trace_id.as_deref()).await;
        }
        Command::Transaction(trace_id) => container.handle_transaction_event(&trace_id),
        Command::Navigation(url) => container.handle_navigation(&url),
        Command::Performance(entry) => container.add_performance_entry(entry),
        Command::Breadcrumb(breadcrumb) => {
            if let Err(e) = container.add_breadcrumb(breadcrumb).await {
                warn!("Failed to buffer breadcrumb: {}", e);
            }
        }
        Command::Visibility { hidden } => {
            if let Err(e) = container.handle_visibility_change(hidden).await {
                warn!("Visibility flush failed: {}", e);
            }
        }
        Command::Blur => {
            if let Err(e) = container.handle_window_blur().await {
                warn!("Blur flush failed: {}", e);
            }
        }
        Command::Focus => {
            container.handle_window_focus().await;
        }
        Command::Status(reply) => {
            let _ = reply.send(ReplayStatus {
                state: container.state(),
                session: container.session().cloned(),
                pending_events: container.pending_length(),
                queue: queue.stats(),
            });
        }
        Command::Stop(reply) => {
            let _ = reply.send(container.stop().await);
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::buffer::InMemoryEventBuffer;
    use crate::recording::event::{EventType, RecordingData};
    use crate::replay::transport::testing::RecordingTransport;
    use crate::session::Sampler;
    use crate::utils::clock::MonotonicClock;
    use crate::utils::config::ReplayPluginOptions;
    use std::time::Duration;

    fn options() -> ReplayPluginOptions {
        ReplayPluginOptions {
            session_sample_rate: 1.0,
            sticky_session: false,
            use_compression: false,
            flush_min_delay_ms: 1_000,
            flush_max_delay_ms: 5_000,
            ..Default::default()
        }
    }

    async fn spawn(options: ReplayPluginOptions) -> (ReplayHandle, JoinHandle<()>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let container = ReplayContainer::new(
            options.clone(),
            Box::new(InMemoryEventBuffer::new()),
            transport.clone(),
            Arc::new(MonotonicClock::new()),
        )
        .unwrap()
        .with_sampler(Sampler::with_seed(options.sample_rates(), 3));

        let (handle, task) = ReplayHandle::spawn(container);
        handle.start().await.unwrap();
        (handle, task, transport)
    }

    fn event(n: u64) -> RecordingEvent {
        RecordingEvent::new(EventType::IncrementalSnapshot, n, serde_json::json!({"n": n}))
    }

    fn event_count(data: &RecordingData) -> usize {
        let RecordingData::Raw(json) = data else {
            panic!("expected raw payload");
        };
        serde_json::from_str::<Vec<RecordingEvent>>(json).unwrap().len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_under_continuous_updates() {
        let (handle, _task, transport) = spawn(options()).await;
        let start = Instant::now();

        for n in 0..12 {
            assert!(handle.record_event(event(n)));
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let sends = transport.send_times();
        assert!(!sends.is_empty());
        assert!(sends[0] - start <= Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period() {
        let (handle, _task, transport) = spawn(options()).await;
        let start = Instant::now();

        handle.record_event(event(0));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.record_event(event(1));
        tokio::time::sleep(Duration::from_millis(6_000)).await;

        let sends = transport.send_times();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0] - start, Duration::from_millis(1_200));
        assert_eq!(event_count(&transport.sent_segments()[0].recording_data), 2);
    }

    #[tokio::test]
    async fn test_commands_see_earlier_events() {
        let (handle, _task, transport) = spawn(options()).await;

        handle.record_event(event(1));
        handle.record_event(event(2));
        assert_eq!(handle.flush().await.unwrap(), FlushOutcome::Sent { segment_id: 0 });

        let sent = transport.sent_segments();
        assert_eq!(event_count(&sent[0].recording_data), 2);
    }

    #[tokio::test]
    async fn test_back_to_back_flushes_are_serialized() {
        let (handle, _task, transport) = spawn(options()).await;

        handle.record_event(event(1));
        let (first, second) = tokio::join!(handle.flush(), handle.flush());

        assert_eq!(first.unwrap(), FlushOutcome::Sent { segment_id: 0 });
        assert_eq!(second.unwrap(), FlushOutcome::Skipped);
        assert_eq!(transport.sent_segments().len(), 1);
    }

    #[tokio::test]
    async fn test_status_and_pause() {
        let (handle, _task, _transport) = spawn(options()).await;

        assert!(handle.record_event(event(1)));
        handle.pause().unwrap();
        assert!(handle.is_paused());
        assert!(!handle.record_event(event(2)));

        let status = handle.status().await.unwrap();
        assert_eq!(status.state, ReplayState::Paused);
        assert_eq!(status.pending_events, 1);
        assert_eq!(status.queue.push_count, 1);
        assert_eq!(status.queue.drop_count, 0);
        assert!(status.session.is_some());
    }

    #[tokio::test]
    async fn test_events_after_resume_are_recorded() {
        let (handle, _task, transport) = spawn(options()).await;

        handle.pause().unwrap();
        assert!(!handle.record_event(event(1)));
        handle.resume().unwrap();
        // Pushed before the task has applied the resume
        assert!(handle.record_event(event(2)));

        let status = handle.status().await.unwrap();
        assert_eq!(status.state, ReplayState::Recording);
        assert_eq!(status.pending_events, 1);

        handle.flush().await.unwrap();
        let sent = transport.sent_segments();
        assert_eq!(event_count(&sent[0].recording_data), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let (handle, task, transport) = spawn(options()).await;

        handle.record_event(event(1));
        handle.stop().await.unwrap();
        task.await.unwrap();

        assert_eq!(transport.sent_segments().len(), 1);
        assert!(matches!(handle.flush().await, Err(ReplayError::ContainerClosed)));
        assert!(matches!(handle.pause(), Err(ReplayError::ContainerClosed)));
    }

    #[tokio::test]
    async fn test_dropping_handles_flushes_and_exits() {
        let (handle, task, transport) = spawn(options()).await;

        handle.record_event(event(1));
        // Make sure the event is buffered before the channel closes
        handle.status().await.unwrap();
        drop(handle);
        task.await.unwrap();

        assert_eq!(transport.sent_segments().len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_events() {
        let (handle, _task, _transport) = spawn(ReplayPluginOptions {
            max_queue_size: 2,
            ..options()
        })
        .await;

        // The task cannot drain while this test holds the only thread
        let accepted = (0..10).filter(|n| handle.record_event(event(*n))).count();
        assert!(accepted >= 2);
        assert!(accepted < 10);
        assert!(handle.queue_stats().drop_count > 0);
    }
}
