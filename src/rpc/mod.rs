//! Line-delimited JSON-RPC transport over stdio (spec.md §6).

pub mod bridge;
pub mod dispatch;
pub mod protocol;

use std::sync::Arc;

use tracing::info;

use crate::cancel::CancelToken;
use crate::state::ServerState;

use protocol::{Request, Response, CANCEL_METHOD};

/// Drain requests from stdin until EOF, dispatching each on its own task
/// so a slow `listen` never blocks a sibling `status` call. Returns once
/// stdin closes (the assistant process exited or closed the pipe).
pub async fn run(state: Arc<ServerState>) {
    let mut requests = bridge::spawn_stdin_reader();

    while let Some(req) = requests.recv().await {
        if req.method == CANCEL_METHOD {
            if let Some(id) = req.params.get("id") {
                if let Some(id_str) = value_as_id_key(id) {
                    state.cancel_by_id(&id_str);
                }
            }
            continue;
        }

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            handle_request(state, req).await;
        });
    }

    info!("stdin closed, JSON-RPC loop exiting");
}

async fn handle_request(state: Arc<ServerState>, req: Request) {
    let Request { id, method, params } = req;

    let Some(id) = id else {
        // Notifications other than $/cancel carry no id and expect no reply.
        dispatch::dispatch(&state, &method, params, CancelToken::new()).await;
        return;
    };

    let id_key = value_as_id_key(&id).unwrap_or_default();
    let cancel = CancelToken::new();
    state.register_cancel(id_key.clone(), cancel.clone());

    let result = dispatch::dispatch(&state, &method, params, cancel).await;

    state.unregister_cancel(&id_key);

    let response = if result.get("success").and_then(|v| v.as_bool()) == Some(false) {
        Response::err(id, result)
    } else {
        Response::ok(id, result)
    };
    bridge::write_line(&serde_json::to_value(&response).unwrap_or_default());
}

/// Collapse a request id (string or number, per the wire format) into a
/// stable lookup key for the cancellation map.
fn value_as_id_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
