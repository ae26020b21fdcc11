// packages/engine/src/worker/protocol.rs
//! Messages exchanged with the compression worker
//!
//! Requests carry a bridge-assigned id; the worker echoes it back so the
//! bridge can match responses to callers regardless of delivery order.

use serde::{Deserialize, Serialize};

/// Worker operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMethod {
    /// Reset the compressor to an empty array
    Init,

    /// Append one serialized event
    AddEvent,

    /// Close the array and return the compressed segment
    Finish,
}

impl WorkerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerMethod::Init => "init",
            WorkerMethod::AddEvent => "add_event",
            WorkerMethod::Finish => "finish",
        }
    }
}

/// Request sent to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: u64,
    pub method: WorkerMethod,
    #[serde(default)]
    pub args: Option<String>,
}

/// Response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WorkerPayload {
    Empty,
    Compressed(Vec<u8>),
    Error(String),
}

impl WorkerPayload {
    /// Text used as error detail when the call failed
    pub fn into_detail(self) -> String {
        match self {
            WorkerPayload::Error(message) => message,
            WorkerPayload::Empty => "worker reported failure without detail".to_string(),
            WorkerPayload::Compressed(bytes) => {
                format!("worker reported failure with {} byte payload", bytes.len())
            }
        }
    }
}

/// Response sent by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: u64,
    pub method: WorkerMethod,
    pub success: bool,
    pub response: WorkerPayload,
}

impl WorkerResponse {
    pub fn ok(id: u64, method: WorkerMethod, response: WorkerPayload) -> Self {
        Self {
            id,
            method,
            success: true,
            response,
        }
    }

    pub fn failed(id: u64, method: WorkerMethod, message: impl Into<String>) -> Self {
        Self {
            id,
            method,
            success: false,
            response: WorkerPayload::Error(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = WorkerRequest {
            id: 3,
            method: WorkerMethod::AddEvent,
            args: Some("{}".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"id":3,"method":"add_event","args":"{}"}"#);
    }

    #[test]
    fn test_failure_detail() {
        let response = WorkerResponse::failed(1, WorkerMethod::Finish, "boom");
        assert!(!response.success);
        assert_eq!(response.response.into_detail(), "boom");
        assert!(WorkerPayload::Empty.into_detail().contains("without detail"));
    }
}
