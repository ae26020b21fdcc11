// packages/engine/src/worker/compression.rs
//! Compression worker body
//!
//! Runs on a dedicated OS thread so zstd work never stalls the async
//! runtime. Requests arrive on a crossbeam channel; responses go back on a
//! tokio channel the bridge awaits. The thread exits when the request
//! channel closes or nobody listens for responses.

use crate::recording::compressor::{CompressionLevel, StreamCompressor};
use crate::utils::errors::{BufferError, WorkerError};
use crate::worker::protocol::{WorkerMethod, WorkerPayload, WorkerRequest, WorkerResponse};
use crossbeam_channel::{Receiver, Sender};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

const WORKER_THREAD_NAME: &str = "replay-compression";

/// Channel ends connecting a bridge to a running worker
pub type WorkerChannels = (Sender<WorkerRequest>, UnboundedReceiver<WorkerResponse>);

/// Start the worker thread
pub fn spawn_compression_worker(level: CompressionLevel) -> Result<WorkerChannels, WorkerError> {
    let (request_tx, request_rx) = crossbeam_channel::unbounded();
    let (response_tx, response_rx) = unbounded_channel();

    std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || run(request_rx, response_tx, level))
        .map_err(|e| WorkerError::Spawn(e.to_string()))?;

    debug!("Compression worker started at level {}", level.as_i32());

    Ok((request_tx, response_rx))
}

fn run(requests: Receiver<WorkerRequest>, responses: UnboundedSender<WorkerResponse>, level: CompressionLevel) {
    let mut worker = CompressionWorker::new(level);

    for request in requests.iter() {
        let response = worker.handle(request);
        if responses.send(response).is_err() {
            break;
        }
    }

    debug!("Compression worker exiting");
}

/// Worker state: the incremental compressor for the current segment
struct CompressionWorker {
    level: CompressionLevel,
    stream: Option<StreamCompressor>,
}

impl CompressionWorker {
    fn new(level: CompressionLevel) -> Self {
        Self { level, stream: None }
    }

    fn handle(&mut self, request: WorkerRequest) -> WorkerResponse {
        let WorkerRequest { id, method, args } = request;

        match self.dispatch(method, args) {
            Ok(payload) => WorkerResponse::ok(id, method, payload),
            Err(e) => {
                warn!("Compression worker call {} failed: {}", method.as_str(), e);
                // Start the next segment from a clean encoder
                self.stream = None;
                WorkerResponse::failed(id, method, e.to_string())
            }
        }
    }

    fn dispatch(&mut self, method: WorkerMethod, args: Option<String>) -> Result<WorkerPayload, BufferError> {
        match method {
            WorkerMethod::Init => {
                self.stream = Some(StreamCompressor::new(self.level)?);
                Ok(WorkerPayload::Empty)
            }
            WorkerMethod::AddEvent => {
                let json = args.ok_or_else(|| {
                    BufferError::Compression("add_event called without an event".to_string())
                })?;
                self.stream()?.push(json.as_bytes())?;
                Ok(WorkerPayload::Empty)
            }
            WorkerMethod::Finish => {
                let compressed = self.stream()?.finish()?;
                Ok(WorkerPayload::Compressed(compressed))
            }
        }
    }

    fn stream(&mut self) -> Result<&mut StreamCompressor, BufferError> {
        if self.stream.is_none() {
            self.stream = Some(StreamCompressor::new(self.level)?);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| BufferError::Compression("compressor unavailable".to_string()))
    }
}
