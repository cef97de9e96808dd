//! Request/response codec for the control socket
//!
//! One JSON object per message, no length framing:
//! - `{"action": "start", "output_path": "/abs/path.wav"}`
//! - `{"action": "stop"}`
//! - `{"status": "success"}` | `{"status": "error", "message": "..."}`

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decode failure for an incoming request payload.
///
/// Never fatal: the connection handler answers with an error response and
/// keeps the connection open.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not a JSON object, or `action` missing/unrecognized.
    #[error("invalid command: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `start` with an empty `output_path`.
    #[error("start requires a non-empty output_path")]
    EmptyOutputPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    Start { output_path: String },
    Stop,
}

impl Request {
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let request: Request = serde_json::from_slice(payload)?;

        if let Request::Start { output_path } = &request {
            if output_path.is_empty() {
                return Err(ProtocolError::EmptyOutputPath);
            }
        }

        Ok(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
