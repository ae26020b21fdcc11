// packages/engine/src/observability/mod.rs
//! Tracing and metrics initialization
//!
//! Metric names emitted by the pipeline are collected here so dashboards and
//! code stay in sync.

use crate::utils::config::{LogFormat, LoggingConfig};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const EVENTS_RECORDED: &str = "replay_events_recorded_total";
pub const EVENTS_DROPPED: &str = "replay_events_dropped_total";
pub const SEGMENTS_SENT: &str = "replay_segments_sent_total";
pub const FLUSH_SKIPPED: &str = "replay_flush_skipped_total";
pub const TRANSPORT_FAILURES: &str = "replay_transport_failures_total";
pub const SESSIONS_CREATED: &str = "replay_sessions_created_total";
pub const WORKER_FALLBACKS: &str = "replay_worker_fallbacks_total";
pub const SEGMENT_BYTES: &str = "replay_segment_bytes";

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is harmless.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };
}

/// Install the Prometheus metrics recorder
///
/// Fails if a global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
