// packages/engine/src/utils/mod.rs
//! Shared utilities: errors, configuration and time

pub mod clock;
pub mod config;
pub mod errors;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ExpiryPolicy, ReplayConfig, ReplayPluginOptions, SampleRates, SessionOptions};
pub use errors::{ReplayError, Result};
