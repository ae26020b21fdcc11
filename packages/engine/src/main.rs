// packages/engine/src/main.rs
//! Session Replay Engine
//!
//! Reads host messages as JSON lines from stdin, records them into a replay
//! container and stores finished segments on disk.

use anyhow::Result;
use serde::Deserialize;
use session_replay_engine::observability::{init_metrics, init_tracing};
use session_replay_engine::recording::{Breadcrumb, PerformanceEntry, RecordingEvent, StorageTransport};
use session_replay_engine::replay::{ReplayContainer, ReplayHandle};
use session_replay_engine::session::SqliteSessionStore;
use session_replay_engine::utils::clock::MonotonicClock;
use session_replay_engine::utils::config::ReplayConfig;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// One line of host input
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostMessage {
    Event { event: RecordingEvent },
    Checkout { event: RecordingEvent },
    Activity,
    Error {
        error_id: String,
        #[serde(default)]
        trace_id: Option<String>,
    },
    Transaction { trace_id: String },
    Navigation { url: String },
    Performance { entry: PerformanceEntry },
    Breadcrumb { breadcrumb: Breadcrumb },
    Visibility { hidden: bool },
    Blur,
    Focus,
    Pause,
    Resume,
    Flush,
}

/// Hand a recorded event to the replay task; `false` if it was refused
fn enqueue(handle: &ReplayHandle, event: RecordingEvent, is_checkout: bool) -> bool {
    let accepted = handle.record(event, is_checkout);
    if !accepted {
        if handle.is_paused() {
            debug!("Replay paused, event dropped");
        } else {
            debug!("Intake queue full, event dropped");
        }
    }
    accepted
}

async fn dispatch(handle: &ReplayHandle, message: HostMessage) -> session_replay_engine::Result<()> {
    match message {
        HostMessage::Event { event } => {
            let is_checkout = event.is_checkout();
            enqueue(handle, event, is_checkout);
        }
        HostMessage::Checkout { event } => {
            enqueue(handle, event, true);
        }
        HostMessage::Activity => handle.trigger_user_activity()?,
        HostMessage::Error { error_id, trace_id } => handle.handle_error_event(error_id, trace_id)?,
        HostMessage::Transaction { trace_id } => handle.handle_transaction_event(trace_id)?,
        HostMessage::Navigation { url } => handle.handle_navigation(url)?,
        HostMessage::Performance { entry } => handle.add_performance_entry(entry)?,
        HostMessage::Breadcrumb { breadcrumb } => handle.add_breadcrumb(breadcrumb)?,
        HostMessage::Visibility { hidden } => handle.handle_visibility_change(hidden)?,
        HostMessage::Blur => handle.handle_window_blur()?,
        HostMessage::Focus => handle.handle_window_focus()?,
        HostMessage::Pause => handle.pause()?,
        HostMessage::Resume => handle.resume()?,
        HostMessage::Flush => {
            let outcome = handle.flush().await?;
            info!("Flush requested by host: {:?}", outcome);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = ReplayConfig::load()?;

    // Initialize observability (tracing, metrics, logging)
    init_tracing(&config.logging);
    let _metrics = init_metrics()?;

    info!("Starting Session Replay Engine v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration loaded: {:?}", config);

    let transport = Arc::new(StorageTransport::new(config.storage.clone()).await?);
    let store = Arc::new(SqliteSessionStore::open(&config.storage.db_path()).await?);

    let container = ReplayContainer::create(config.replay.clone(), transport, Arc::new(MonotonicClock::new()))
        .await?
        .with_session_store(store);

    let (handle, task) = ReplayHandle::spawn(container);
    handle.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<HostMessage>(&line) {
                        Ok(message) => {
                            if let Err(e) = dispatch(&handle, message).await {
                                warn!("Host message failed: {}", e);
                            }
                        }
                        Err(e) => warn!("Ignoring malformed host message: {}", e),
                    },
                    Ok(None) => {
                        info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, cleaning up...");
                break;
            }
        }
    }

    if let Err(e) = handle.stop().await {
        error!("Failed to stop replay: {}", e);
    }
    task.await?;

    info!("Replay engine stopped");
    Ok(())
}
