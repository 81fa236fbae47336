//! Structured error taxonomy for the JSON-RPC tool surface.
//!
//! Internal plumbing (engine adapters, file I/O, startup) still returns
//! `anyhow::Result`; this module is the closed set of *domain* failures
//! that get surfaced verbatim to the caller as `{ error: <kind>, message, ... }`.

use serde::Serialize;
use thiserror::Error;

/// Tag written to the `error` field of a JSON-RPC error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidVoice,
    NameOccupied,
    MicBusy,
    Muted,
    Timeout,
    Cancelled,
    EngineUnavailable,
}

/// A domain failure carrying a `kind` tag, a human-readable message, and
/// arbitrary extra context fields merged into the JSON-RPC error object.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn invalid_voice(voice_id: &str) -> Self {
        Self::new(
            ErrorKind::InvalidVoice,
            format!("'{voice_id}' is not a known voice id"),
        )
    }

    pub fn name_occupied(session_name: &str, session_voice: &str) -> Self {
        Self::new(
            ErrorKind::NameOccupied,
            format!("this process currently speaks as '{session_name}', not the requested name"),
        )
        .with("session_name", session_name)
        .with("session_voice", session_voice)
    }

    pub fn mic_busy() -> Self {
        Self::new(ErrorKind::MicBusy, "a listen is already in flight in this process")
    }

    pub fn muted() -> Self {
        Self::new(ErrorKind::Muted, "this process is muted")
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "no speech detected before timeout")
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "listen was cancelled")
    }

    pub fn engine_unavailable(engine: &str) -> Self {
        Self::new(
            ErrorKind::EngineUnavailable,
            format!("{engine} failed to load at startup"),
        )
    }

    /// Render as the `{ error, message, ...context }` JSON object every
    /// tool handler returns on failure.
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("success".to_string(), serde_json::Value::Bool(false));
        obj.insert(
            "error".to_string(),
            serde_json::to_value(self.kind).unwrap(),
        );
        obj.insert(
            "message".to_string(),
            serde_json::Value::String(self.message.clone()),
        );
        for (k, v) in &self.context {
            obj.insert(k.clone(), v.clone());
        }
        serde_json::Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_occupied_carries_context() {
        let err = RpcError::name_occupied("Adam", "am_adam");
        let json = err.to_json();
        assert_eq!(json["error"], "name_occupied");
        assert_eq!(json["session_name"], "Adam");
        assert_eq!(json["session_voice"], "am_adam");
        assert_eq!(json["success"], false);
    }
}
