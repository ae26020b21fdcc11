// packages/engine/src/worker/bridge.rs
//! Request/response bridge to the compression worker
//!
//! Every call gets a fresh id and a oneshot waiting in the pending table.
//! A dispatcher task resolves entries by id as responses arrive, in any
//! order. Responses with no pending entry (duplicates, late arrivals after a
//! timeout or teardown) are dropped.

use crate::recording::compressor::CompressionLevel;
use crate::utils::errors::WorkerError;
use crate::worker::compression::spawn_compression_worker;
use crate::worker::protocol::{WorkerMethod, WorkerPayload, WorkerRequest, WorkerResponse};
use crossbeam_channel::Sender;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

type PendingRequests = DashMap<u64, oneshot::Sender<Result<WorkerPayload, String>>>;

/// Handle to a compression worker
pub struct WorkerBridge {
    requests: Mutex<Option<Sender<WorkerRequest>>>,
    pending: Arc<PendingRequests>,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    timeout: Duration,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerBridge {
    /// Start a worker thread and connect to it
    pub fn spawn(level: CompressionLevel, timeout: Duration) -> Result<Self, WorkerError> {
        let (requests, responses) = spawn_compression_worker(level)?;
        Ok(Self::connect(requests, responses, timeout))
    }

    /// Connect to an already running worker through its channel ends
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        requests: Sender<WorkerRequest>,
        responses: UnboundedReceiver<WorkerResponse>,
        timeout: Duration,
    ) -> Self {
        let pending: Arc<PendingRequests> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        let dispatcher = Self::spawn_dispatcher(responses, Arc::clone(&pending), Arc::clone(&closed));

        Self {
            requests: Mutex::new(Some(requests)),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            timeout,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    fn spawn_dispatcher(
        mut responses: UnboundedReceiver<WorkerResponse>,
        pending: Arc<PendingRequests>,
        closed: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(response) = responses.recv().await {
                Self::handle_response(&pending, &closed, response);
            }

            // Worker gone: fail everything still waiting
            closed.store(true, Ordering::SeqCst);
            pending.clear();
            debug!("Compression worker response channel closed");
        })
    }

    fn handle_response(pending: &PendingRequests, closed: &AtomicBool, response: WorkerResponse) {
        if closed.load(Ordering::SeqCst) {
            trace!("Ignoring worker response {} after teardown", response.id);
            return;
        }

        match pending.remove(&response.id) {
            Some((_, sender)) => {
                let result = if response.success {
                    Ok(response.response)
                } else {
                    Err(response.response.into_detail())
                };
                let _ = sender.send(result);
            }
            None => {
                debug!(
                    "Ignoring worker response with unknown id {} ({})",
                    response.id,
                    response.method.as_str()
                );
            }
        }
    }

    /// Send a request and wait for its response
    pub async fn post_message(
        &self,
        method: WorkerMethod,
        args: Option<String>,
    ) -> Result<WorkerPayload, WorkerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WorkerError::Unreachable);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let sent = {
            let requests = self.requests.lock();
            match requests.as_ref() {
                Some(requests) => requests.send(WorkerRequest { id, method, args }).is_ok(),
                None => false,
            }
        };

        if !sent {
            self.pending.remove(&id);
            return Err(WorkerError::Unreachable);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => {
                self.pending.remove(&id);
                Err(WorkerError::Timeout(method.as_str().to_string()))
            }
            Ok(Err(_)) => Err(WorkerError::Unreachable),
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(detail))) => Err(WorkerError::Failed {
                method: method.as_str().to_string(),
                detail,
            }),
        }
    }

    /// Number of calls awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear the bridge down
    ///
    /// In-flight calls fail with [`WorkerError::Unreachable`]; later calls fail
    /// immediately. Idempotent.
    pub fn destroy(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Dropping the sender lets the worker thread exit
        self.requests.lock().take();
        self.pending.clear();

        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }

        debug!("Compression worker bridge destroyed");
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.destroy();
    }
}
