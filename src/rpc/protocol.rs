//! Line-delimited JSON-RPC wire types (spec.md §6).
//!
//! Each request line carries an `id` used to pair it with its response
//! and, separately, with an MCP-style `$/cancel` notification naming
//! that same `id`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl Response {
    pub fn ok(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: serde_json::Value, error: serde_json::Value) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Method name for the cancellation notification: `{"method":"$/cancel","params":{"id":...}}`.
pub const CANCEL_METHOD: &str = "$/cancel";
