// packages/engine/src/utils/config.rs
//! Engine configuration
//!
//! Loaded from (lowest precedence first):
//! 1. Built-in defaults
//! 2. `replay-engine.{toml,yaml,json}` in the working directory, or the file
//!    named by `REPLAY_CONFIG`
//! 3. Environment variables prefixed `REPLAY_ENGINE__`, e.g.
//!    `REPLAY_ENGINE__REPLAY__FLUSH_MIN_DELAY_MS=2000`

use crate::recording::storage::StorageConfig;
use crate::utils::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default quiet period before a flush
pub const DEFAULT_FLUSH_MIN_DELAY_MS: u64 = 5_000;

/// Default ceiling on how long updates may accumulate before a flush
pub const DEFAULT_FLUSH_MAX_DELAY_MS: u64 = 5_500;

/// Idle time after which a session expires (5 minutes)
pub const SESSION_IDLE_TIMEOUT_MS: u64 = 300_000;

/// Maximum age of a session (60 minutes)
pub const MAX_SESSION_LIFE_MS: u64 = 3_600_000;

const CONFIG_FILE_STEM: &str = "replay-engine";
const CONFIG_PATH_VAR: &str = "REPLAY_CONFIG";
const ENV_PREFIX: &str = "REPLAY_ENGINE";

/// What to do with buffered events when their session expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Discard the events
    Drop,

    /// Send them as a final segment of the expiring session
    FlushUnderOldSession,
}

/// Replay options consumed at container construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayPluginOptions {
    /// Probability that a new session is recorded in full
    pub session_sample_rate: f64,

    /// Probability that an unsampled session is upgraded on its first error
    pub error_sample_rate: f64,

    /// Persist the session across restarts of the host
    pub sticky_session: bool,

    /// Quiet period (debounce) in milliseconds
    pub flush_min_delay_ms: u64,

    /// Hard ceiling on flush latency in milliseconds
    pub flush_max_delay_ms: u64,

    /// Offload compression to the background worker
    pub use_compression: bool,

    /// Idle timeout in milliseconds
    pub session_idle_timeout_ms: u64,

    /// Maximum session age in milliseconds
    pub max_session_life_ms: u64,

    /// Capacity of the intake queue between producers and the container
    pub max_queue_size: usize,

    /// Timeout for a single compression worker call
    pub worker_request_timeout_ms: u64,

    /// Handling of buffered events on session expiry
    pub expiry_policy: ExpiryPolicy,
}

impl Default for ReplayPluginOptions {
    fn default() -> Self {
        Self {
            session_sample_rate: 0.1,
            error_sample_rate: 1.0,
            sticky_session: true,
            flush_min_delay_ms: DEFAULT_FLUSH_MIN_DELAY_MS,
            flush_max_delay_ms: DEFAULT_FLUSH_MAX_DELAY_MS,
            use_compression: true,
            session_idle_timeout_ms: SESSION_IDLE_TIMEOUT_MS,
            max_session_life_ms: MAX_SESSION_LIFE_MS,
            max_queue_size: 100_000,
            worker_request_timeout_ms: 10_000,
            expiry_policy: ExpiryPolicy::FlushUnderOldSession,
        }
    }
}

impl ReplayPluginOptions {
    /// Check ranges and orderings
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("session_sample_rate", self.session_sample_rate)?;
        check_rate("error_sample_rate", self.error_sample_rate)?;

        if self.flush_min_delay_ms > self.flush_max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "flush_min_delay_ms ({}) exceeds flush_max_delay_ms ({})",
                self.flush_min_delay_ms, self.flush_max_delay_ms
            )));
        }

        for (name, value) in [
            ("flush_max_delay_ms", self.flush_max_delay_ms),
            ("session_idle_timeout_ms", self.session_idle_timeout_ms),
            ("max_session_life_ms", self.max_session_life_ms),
            ("worker_request_timeout_ms", self.worker_request_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }

        if self.max_queue_size == 0 {
            return Err(ConfigError::Invalid("max_queue_size must be non-zero".into()));
        }

        Ok(())
    }

    pub fn sample_rates(&self) -> SampleRates {
        SampleRates {
            session_sample_rate: self.session_sample_rate,
            error_sample_rate: self.error_sample_rate,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            sticky_session: self.sticky_session,
            idle_timeout_ms: self.session_idle_timeout_ms,
            max_age_ms: self.max_session_life_ms,
        }
    }

    pub fn flush_min_delay(&self) -> Duration {
        Duration::from_millis(self.flush_min_delay_ms)
    }

    pub fn flush_max_delay(&self) -> Duration {
        Duration::from_millis(self.flush_max_delay_ms)
    }

    pub fn worker_request_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_request_timeout_ms)
    }
}

fn check_rate(name: &str, rate: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::Invalid(format!(
            "{} must be within [0, 1], got {}",
            name, rate
        )));
    }
    Ok(())
}

/// Sampling rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRates {
    pub session_sample_rate: f64,
    pub error_sample_rate: f64,
}

/// Session lifetime options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub sticky_session: bool,
    pub idle_timeout_ms: u64,
    pub max_age_ms: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub replay: ReplayPluginOptions,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl ReplayConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| CONFIG_FILE_STEM.to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ReplayConfig = settings.try_deserialize()?;
        config.replay.validate()?;

        Ok(config)
    }
}
