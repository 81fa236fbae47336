//! Routes one decoded request to its handler and builds the JSON result
//! body (spec.md §6). Domain failures (`RpcError`) are rendered via
//! `to_json()`; everything else succeeds with a `{success: true, ...}` body.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::cancel::CancelToken;
use crate::listen::ListenConfig;
use crate::state::ServerState;

fn str_param(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn f64_param(params: &Value, key: &str, default: f64) -> f64 {
    params.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

fn f32_param(params: &Value, key: &str, default: f32) -> f32 {
    params.get(key).and_then(|v| v.as_f64()).map(|v| v as f32).unwrap_or(default)
}

fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn listen_config_from_params(params: &Value, state: &ServerState) -> ListenConfig {
    let defaults = ListenConfig::default();
    ListenConfig {
        timeout_secs: f64_param(params, "timeout_secs", defaults.timeout_secs),
        silence_threshold_secs: f64_param(params, "silence_threshold_secs", defaults.silence_threshold_secs),
        vad_threshold: f32_param(params, "vad_threshold", defaults.vad_threshold),
        device_name: str_param(params, "device").or_else(|| state.default_input_device()),
    }
}

/// Dispatch `method` with `params` against shared state. `cancel` is this
/// request's own cancellation token, already registered under its id by
/// the caller (`rpc::run`) for `$/cancel` delivery.
pub async fn dispatch(state: &Arc<ServerState>, method: &str, params: Value, cancel: CancelToken) -> Value {
    match method {
        "speak" => handle_speak(state, &params).await,
        "listen" => handle_listen(state, &params, cancel).await,
        "speak_then_listen" => handle_speak_then_listen(state, &params, cancel).await,
        "set_voice" => handle_set_voice(state, &params),
        "get_voice_registry" => handle_get_voice_registry(state),
        "list_voices" => handle_list_voices(),
        "mute" => handle_mute(state, true),
        "unmute" => handle_mute(state, false),
        "stop" => handle_stop(state),
        "status" => handle_status(state),
        "wake_enable" => handle_wake_enable(state),
        "wake_disable" => handle_wake_disable(state),
        other => json!({
            "success": false,
            "error": "unknown_method",
            "message": format!("no such method: {other}"),
        }),
    }
}

async fn handle_speak(state: &Arc<ServerState>, params: &Value) -> Value {
    let name = str_param(params, "name").unwrap_or_else(|| state.session_name());
    let text = str_param(params, "text").unwrap_or_default();
    let speed = f32_param(params, "speed", 1.0);
    let block = bool_param(params, "block", true);

    match state.speak(&name, &text, speed, block).await {
        Ok(result) => json!({
            "success": true,
            "voice": result.voice_id,
            "auto_assigned": result.newly_assigned,
            "queued": result.queued,
            "synthesis_ms": result.synth_ms,
            "duration_ms": result.playback_ms,
        }),
        Err(e) => e.to_json(),
    }
}

async fn handle_listen(state: &Arc<ServerState>, params: &Value, cancel: CancelToken) -> Value {
    let cfg = listen_config_from_params(params, state);
    let suppress_ready_cue = bool_param(params, "suppress_ready_cue", false);
    match state.listen(cfg, cancel, suppress_ready_cue).await {
        Ok(outcome) => json!({
            "success": true,
            "text": outcome.text,
            "confidence": outcome.confidence,
            "duration_ms": outcome.duration_ms,
            "transcription_ms": outcome.transcription_ms,
        }),
        Err(e) => e.to_json(),
    }
}

async fn handle_speak_then_listen(state: &Arc<ServerState>, params: &Value, cancel: CancelToken) -> Value {
    let name = str_param(params, "name").unwrap_or_else(|| state.session_name());
    let text = str_param(params, "text").unwrap_or_default();
    let speed = f32_param(params, "speed", 1.0);
    let listen_cfg = listen_config_from_params(params, state);

    let result = state.speak_then_listen(&name, &text, speed, listen_cfg, cancel).await;

    let speak_json = match result.speak {
        Ok(r) => json!({
            "success": true,
            "voice": r.voice_id,
            "auto_assigned": r.newly_assigned,
            "queued": r.queued,
            "synthesis_ms": r.synth_ms,
            "duration_ms": r.playback_ms,
        }),
        Err(e) => e.to_json(),
    };

    let mut listen_json = match result.listen {
        Ok(o) => json!({
            "success": true,
            "text": o.text,
            "confidence": o.confidence,
            "duration_ms": o.duration_ms,
            "transcription_ms": o.transcription_ms,
        }),
        Err(e) => e.to_json(),
    };
    if result.nudge_spoken {
        listen_json["nudge_spoken"] = json!(true);
    }

    json!({ "speak": speak_json, "listen": listen_json })
}

fn handle_set_voice(state: &Arc<ServerState>, params: &Value) -> Value {
    let name = match str_param(params, "name") {
        Some(n) => n,
        None => return json!({"success": false, "error": "invalid_voice", "message": "missing 'name'"}),
    };
    let voice = match str_param(params, "voice") {
        Some(v) => v,
        None => return json!({"success": false, "error": "invalid_voice", "message": "missing 'voice'"}),
    };

    match state.set_voice(&name, &voice) {
        Ok(r) => json!({
            "success": true,
            "name": r.name,
            "voice": r.voice,
            "previous_name": r.previous_name,
        }),
        Err(e) => e.to_json(),
    }
}

fn handle_get_voice_registry(state: &Arc<ServerState>) -> Value {
    let registry = state.get_voice_registry();
    let total_assigned = registry.len();
    let available_pool: Vec<&str> = crate::catalogue::VOICES.iter().map(|v| v.id).collect();
    json!({
        "success": true,
        "registry": registry,
        "available_pool": available_pool,
        "total_assigned": total_assigned,
        "total_available": crate::catalogue::VOICES.len(),
    })
}

fn handle_list_voices() -> Value {
    let voices: Vec<Value> = crate::catalogue::VOICES
        .iter()
        .map(|v| {
            json!({
                "id": v.id,
                "gender": match v.gender {
                    crate::catalogue::Gender::Male => "male",
                    crate::catalogue::Gender::Female => "female",
                },
                "accent": v.lang,
            })
        })
        .collect();
    json!({ "success": true, "total": voices.len(), "voices": voices })
}

fn handle_mute(state: &Arc<ServerState>, muted: bool) -> Value {
    state.set_muted(muted);
    json!({ "success": true, "muted": muted })
}

fn handle_stop(state: &Arc<ServerState>) -> Value {
    let (stopped_playback, cancelled_listen) = state.stop();
    json!({
        "success": true,
        "stopped_playback": stopped_playback,
        "cancelled_listen": cancelled_listen,
    })
}

fn handle_status(state: &Arc<ServerState>) -> Value {
    let snap = state.status();
    let mut body = json!({
        "success": true,
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
        body["wake_word"] = json!({
            "enabled": w.enabled,
            "listening": w.listening,
            "model": w.model,
        });
    }
    body
}

fn handle_wake_enable(state: &Arc<ServerState>) -> Value {
    let listening = state.wake_enable();
    json!({ "success": true, "listening": listening })
}

fn handle_wake_disable(state: &Arc<ServerState>) -> Value {
    state.wake_disable();
    json!({ "success": true, "listening": false })
}
