//! Loopback HTTP side-channel (spec.md §4.6): lets sibling sessions and
//! the wake-word router reach this process without going through its
//! own stdin, which only the owning assistant process can write to.

use std::net::SocketAddr;
use std::process::Command;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::listen::ListenConfig;
use crate::state::ServerState;

#[derive(Deserialize)]
struct SpeakBody {
    text: String,
    #[serde(default = "default_speed")]
    speed: f32,
    #[serde(default = "default_block")]
    block: bool,
}

fn default_speed() -> f32 {
    1.0
}

fn default_block() -> bool {
    true
}

#[derive(Deserialize, Default)]
struct ListenBody {
    #[serde(default)]
    timeout_secs: Option<f64>,
    #[serde(default)]
    silence_threshold_secs: Option<f64>,
}

#[derive(Deserialize)]
struct SessionBody {
    session_id: String,
}

#[derive(Deserialize)]
struct InjectBody {
    text: String,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/listen", post(listen))
        .route("/speak", post(speak))
        .route("/session", post(session))
        .route("/inject", post(inject))
        .with_state(state)
}

/// Bind to loopback on `port`, serving until the process shuts down.
pub async fn serve(state: Arc<ServerState>, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state).into_make_service()).await
}

async fn status(State(state): State<Arc<ServerState>>) -> Json<Value> {
    let snap = state.status();
    let mut body = json!({
        "tts": snap.engines.tts,
        "stt": snap.engines.stt,
        "vad": snap.engines.vad_loaded,
        "muted": snap.muted,
        "uptime_s": snap.uptime_s,
        "registry_size": snap.registry_size,
        "queue_depth": snap.queue_depth,
        "session": {
            "name": snap.session.name,
            "voice": snap.session.voice_id,
            "port": snap.session.port,
            "pid": snap.session.pid,
        },
    });
    if let Some(w) = snap.wake_word {
        body["wake_word"] = json!({"enabled": w.enabled, "listening": w.listening, "model": w.model});
    }
    Json(body)
}

/// Cross-session listen: an external push-to-talk trigger already gave
/// its own audible cue, so the pipeline's own is suppressed (spec.md §4.4).
async fn listen(State(state): State<Arc<ServerState>>, Json(body): Json<ListenBody>) -> Json<Value> {
    let defaults = ListenConfig::default();
    let cfg = ListenConfig {
        timeout_secs: body.timeout_secs.unwrap_or(defaults.timeout_secs),
        silence_threshold_secs: body.silence_threshold_secs.unwrap_or(defaults.silence_threshold_secs),
        device_name: state.default_input_device(),
        ..defaults
    };
    match state.listen(cfg, crate::cancel::CancelToken::new(), true).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "text": outcome.text,
            "confidence": outcome.confidence,
            "duration_ms": outcome.duration_ms,
            "transcription_ms": outcome.transcription_ms,
        })),
        Err(e) => Json(e.to_json()),
    }
}

async fn speak(State(state): State<Arc<ServerState>>, Json(body): Json<SpeakBody>) -> Json<Value> {
    let name = state.session_name();
    match state.speak(&name, &body.text, body.speed, body.block).await {
        Ok(r) => Json(json!({
            "success": true,
            "voice": r.voice_id,
            "auto_assigned": r.newly_assigned,
            "queued": r.queued,
            "synthesis_ms": r.synth_ms,
            "duration_ms": r.playback_ms,
        })),
        Err(e) => Json(e.to_json()),
    }
}

async fn session(State(state): State<Arc<ServerState>>, Json(body): Json<SessionBody>) -> Json<Value> {
    match state.attach_session(&body.session_id).await {
        Ok(entry) => Json(json!({
            "success": true,
            "name": entry.name,
            "voice": entry.voice_id,
        })),
        Err(e) => Json(json!({"success": false, "error": "io_error", "message": e.to_string()})),
    }
}

/// Delivery target for the wake-word router: writes recognized text into
/// whatever terminal multiplexer pane this session is bound to, if known.
async fn inject(State(state): State<Arc<ServerState>>, Json(body): Json<InjectBody>) -> Json<Value> {
    let tmux_session = state.own_entry.lock().unwrap().tmux_session.clone();
    let Some(tmux_session) = tmux_session else {
        warn!("received /inject but this session has no tmux binding, dropping");
        return Json(json!({"success": false, "error": "no_tmux_session"}));
    };

    let result = Command::new("tmux")
        .args(["send-keys", "-t", &tmux_session, &body.text, "Enter"])
        .status();

    match result {
        Ok(status) if status.success() => Json(json!({"success": true})),
        Ok(status) => Json(json!({"success": false, "error": "tmux_exit", "message": format!("tmux exited with {status}")})),
        Err(e) => {
            warn!("failed to invoke tmux send-keys: {e}");
            Json(json!({"success": false, "error": "tmux_spawn_failed", "message": e.to_string()}))
        }
    }
}
