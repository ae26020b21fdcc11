// packages/engine/src/session/state.rs
//! Replay session record

use crate::utils::config::SessionOptions;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sampling decision of a session
///
/// Serialized as `false`, `"session"` or `"error"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampled {
    /// Not recorded (may still be upgraded to `Error`)
    NotSampled,

    /// Recorded in full from the start
    Session,

    /// Recording triggered by an error
    Error,
}

impl Sampled {
    pub fn is_sampled(&self) -> bool {
        !matches!(self, Sampled::NotSampled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sampled::NotSampled => "false",
            Sampled::Session => "session",
            Sampled::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "false" => Some(Sampled::NotSampled),
            "session" => Some(Sampled::Session),
            "error" => Some(Sampled::Error),
            _ => None,
        }
    }
}

impl Serialize for Sampled {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Sampled::NotSampled => serializer.serialize_bool(false),
            other => serializer.serialize_str(other.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Sampled {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Mode(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(Sampled::NotSampled),
            Raw::Flag(true) => Ok(Sampled::Session),
            Raw::Mode(mode) => Sampled::parse(&mode)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown sampling mode '{}'", mode))),
        }
    }
}

/// Identity and activity clock of one replay session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id, also the replay id
    pub id: String,

    /// Creation time (epoch ms)
    pub started: u64,

    /// Last user activity (epoch ms), never before `started`
    pub last_activity: u64,

    /// Next segment to be sent
    pub segment_id: u32,

    /// Session this one replaced
    #[serde(default)]
    pub previous_session_id: Option<String>,

    sampled: Sampled,
}

impl Session {
    /// New session starting at `now`
    pub fn create(now: u64, sampled: Sampled, previous_session_id: Option<String>) -> Self {
        Self {
            id: new_session_id(),
            started: now,
            last_activity: now,
            segment_id: 0,
            previous_session_id,
            sampled,
        }
    }

    pub fn sampled(&self) -> Sampled {
        self.sampled
    }

    /// Idle for longer than the idle timeout, or older than the max age
    pub fn is_expired(&self, now: u64, options: &SessionOptions) -> bool {
        now.saturating_sub(self.last_activity) > options.idle_timeout_ms
            || now.saturating_sub(self.started) > options.max_age_ms
    }

    /// Record activity at `now`; the activity clock never moves backwards
    pub fn touch(&mut self, now: u64) {
        self.last_activity = self.last_activity.max(now).max(self.started);
    }

    /// Flip an unsampled session to error sampling
    ///
    /// Returns `true` only for the call that performed the flip.
    pub fn upgrade_to_error_sampling(&mut self) -> bool {
        if self.sampled == Sampled::NotSampled {
            self.sampled = Sampled::Error;
            true
        } else {
            false
        }
    }

    /// Move to the next segment after an acknowledged send
    pub fn advance_segment(&mut self) {
        self.segment_id += 1;
    }
}

fn new_session_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}
