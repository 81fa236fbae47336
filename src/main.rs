//! voxd — a long-running local voice-coordination daemon.
//!
//! Speaks for and listens on behalf of whichever coding-assistant process
//! starts it, over line-delimited JSON-RPC on stdin/stdout, coordinating
//! with sibling processes through a shared on-disk session registry and
//! a loopback HTTP side-channel (spec.md §4.7).

mod audio;
mod cancel;
mod catalogue;
mod config;
mod error;
mod http;
mod listen;
mod logging;
mod rpc;
mod session_registry;
mod speech;
mod state;
mod synth;
mod transcribe;
mod vad;
mod voice_registry;
mod wav;
mod wake_word;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use audio::MicArbiter;
use config::paths::get_data_dir;
use config::{read_config, write_config};
use listen::ListenPipeline;
use session_registry::SessionRegistry;
use state::{EngineStatus, ServerState};
use synth::{create_tts_engine, TtsEngine};
use transcribe::{create_stt_engine, SttAdapter};
use vad::{FakeVad, SileroVad, VadEngine};
use voice_registry::VoiceRegistry;
use wake_word::{FakeWakeWord, OpenWakeWord, WakeWordEngine, WakeWordListener};

#[tokio::main]
async fn main() {
    let _log_guard = logging::init();
    info!("voxd starting up");

    let data_dir = get_data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        error!("failed to create data directory {}: {e}", data_dir.display());
    }

    let mut config = read_config();

    let tts_adapter = config.tts.adapter.clone().unwrap_or_else(|| "fake".to_string());
    let tts_engine: Option<Arc<dyn TtsEngine>> = match create_tts_engine(
        &tts_adapter,
        &data_dir,
        config.tts.voice.as_deref(),
        config.tts.api_key.as_deref(),
        config.tts.endpoint.as_deref(),
    ) {
        Ok(engine) => {
            info!(adapter = %tts_adapter, "tts engine ready");
            Some(Arc::from(engine))
        }
        Err(e) => {
            warn!("tts engine '{tts_adapter}' unavailable, speak() will degrade: {e}");
            None
        }
    };

    let stt_adapter_name = config.stt.adapter.clone().unwrap_or_else(|| "fake".to_string());
    let stt_engine: Option<Arc<SttAdapter>> = match create_stt_engine(
        &stt_adapter_name,
        &data_dir,
        config.stt.model_name.as_deref(),
        config.stt.api_key.as_deref(),
        config.stt.endpoint.as_deref(),
    ) {
        Ok(engine) => {
            info!(adapter = %stt_adapter_name, "stt engine ready");
            Some(Arc::new(engine))
        }
        Err(e) => {
            warn!("stt engine '{stt_adapter_name}' unavailable, listen() will degrade: {e}");
            None
        }
    };

    if tts_engine.is_none() && stt_engine.is_none() {
        error!("neither tts nor stt engine is available, nothing useful can run — aborting");
        std::process::exit(1);
    }

    let models_dir = data_dir.join("models");
    let mut listen_vad: Box<dyn VadEngine> = Box::new(SileroVad::new());
    let vad_loaded = listen_vad.load(&models_dir);
    if !vad_loaded {
        warn!("silero VAD model failed to load, falling back to energy-based VAD");
        listen_vad = Box::new(FakeVad::default());
    }

    let voice_registry = Arc::new(VoiceRegistry::load(&config));

    let preferred_name = config
        .last_voice_name
        .clone()
        .unwrap_or_else(|| config.main_agent.clone());
    let session_id = std::env::var("VOXD_SESSION_ID").ok();
    let tmux_session = std::env::var("TMUX_PANE").ok();

    let sessions = Arc::new(SessionRegistry::new());
    let own_entry = match sessions.register_reconciled(
        &preferred_name,
        &voice_registry,
        config.http_port_base,
        session_id.as_deref(),
        tmux_session.as_deref(),
    ) {
        Ok(entry) => entry,
        Err(e) => {
            error!("failed to register session: {e}");
            std::process::exit(1);
        }
    };
    info!(name = %own_entry.name, voice = %own_entry.voice_id, port = own_entry.port, "session registered");

    if config.last_voice_name.as_deref() != Some(own_entry.name.as_str()) {
        config.last_voice_name = Some(own_entry.name.clone());
        if let Err(e) = write_config(&config) {
            warn!("failed to persist last_voice_name: {e}");
        }
    }

    let own_entry = Arc::new(Mutex::new(own_entry));

    let muted = Arc::new(AtomicBool::new(config.mute_on_start));
    let arbiter = MicArbiter::new();

    let speech = if let Some(tts) = tts_engine.clone() {
        let sample_rate = match tts_adapter.as_str() {
            "kokoro" => 24_000,
            _ => 16_000,
        };
        let queue = speech::spawn_worker(tts, config.tts.output_device.clone(), None, sample_rate);
        speech::SpeechPipeline::new(queue, Arc::clone(&voice_registry), Arc::clone(&muted))
    } else {
        let fake_tts: Arc<dyn TtsEngine> = Arc::new(synth::fake::FakeTts::new("fake"));
        let queue = speech::spawn_worker(fake_tts, None, None, 16_000);
        speech::SpeechPipeline::new(queue, Arc::clone(&voice_registry), Arc::clone(&muted))
    };

    let stt_for_listen = stt_engine
        .clone()
        .unwrap_or_else(|| Arc::new(SttAdapter::Fake(transcribe::fake::FakeStt::new())));
    let listen_pipeline = Arc::new(ListenPipeline::new(Arc::clone(&arbiter), stt_for_listen, listen_vad, Arc::clone(&muted)));

    let engine_status = EngineStatus {
        tts: tts_engine.as_ref().map(|t| t.name()),
        stt: stt_engine.as_ref().map(|_| stt_adapter_name.clone()),
        vad_loaded,
    };

    let wake_word_model_name = if config.wake_word_enabled {
        "openwakeword".to_string()
    } else {
        "disabled".to_string()
    };

    let state = Arc::new(ServerState::new(
        config.clone(),
        Arc::clone(&voice_registry),
        Arc::clone(&sessions),
        speech,
        listen_pipeline,
        Arc::clone(&own_entry),
        engine_status,
        wake_word_model_name,
    ));

    if config.wake_word_enabled {
        if let Some(stt) = stt_engine.clone() {
            let mut ww_engine: Box<dyn WakeWordEngine> = Box::new(OpenWakeWord::new());
            let mut ww_vad: Box<dyn VadEngine> = Box::new(SileroVad::new());
            if !ww_vad.load(&models_dir) {
                ww_vad = Box::new(FakeVad::default());
            }
            if !ww_engine.load(&models_dir) {
                warn!("wake-word model unavailable, falling back to energy-based trigger");
                ww_engine = Box::new(FakeWakeWord::default());
            }
            let listener = WakeWordListener::spawn(
                Arc::clone(&arbiter),
                ww_engine,
                ww_vad,
                stt,
                Arc::clone(&sessions),
                models_dir.clone(),
                config.stt.input_device.clone(),
                Arc::clone(&own_entry),
                true,
            );
            state.set_wake_word(listener);
            info!("wake-word listener enabled");
        } else {
            warn!("wake_word_enabled is set but no stt engine is available, skipping");
        }
    }

    let http_state = Arc::clone(&state);
    let http_port = own_entry.lock().unwrap().port;
    tokio::spawn(async move {
        if let Err(e) = http::serve(http_state, http_port).await {
            error!("http side-channel exited: {e}");
        }
    });

    let sweep_sessions = Arc::clone(&sessions);
    tokio::spawn(async move {
        let own_pid = std::process::id();
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .expect("reqwest client builds with a fixed timeout");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            probe_siblings(&sweep_sessions, &http_client, own_pid).await;
            if let Err(e) = sweep_sessions.sweep() {
                warn!("session sweep failed: {e}");
            }
        }
    });

    tokio::select! {
        _ = rpc::run(Arc::clone(&state)) => {
            info!("shutting down: stdin closed");
        }
        _ = wait_for_shutdown_signal() => {
            info!("shutting down: signal received");
        }
    }

    state.stop();
    if let Err(e) = persist_voice_registry(&mut config, &voice_registry) {
        warn!("failed to persist voice registry on shutdown: {e}");
    }
    let pid = std::process::id();
    if let Err(e) = sessions.unregister(pid) {
        warn!("failed to unregister session on shutdown: {e}");
    }
    info!("voxd exited cleanly");
}

/// Probe each live sibling's `/status` endpoint and record a response as
/// proof its HTTP side-channel is still alive (spec.md §4.2), so `sweep`'s
/// HTTP-orphan threshold has something other than PID liveness to act on.
async fn probe_siblings(sessions: &SessionRegistry, client: &reqwest::Client, own_pid: u32) {
    let siblings = match sessions.snapshot() {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to read session registry for http probe: {e}");
            return;
        }
    };
    for sibling in siblings.iter().filter(|e| e.pid != own_pid) {
        let url = format!("http://127.0.0.1:{}/status", sibling.port);
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                if let Err(e) = sessions.mark_seen(sibling.pid) {
                    warn!("failed to record http probe success for pid {}: {e}", sibling.pid);
                }
            }
            Ok(resp) => {
                warn!("sibling pid {} answered /status with {}", sibling.pid, resp.status());
            }
            Err(e) => {
                warn!("sibling pid {} did not answer /status: {e}", sibling.pid);
            }
        }
    }
}

/// Waits for either SIGINT or, on Unix, SIGTERM, so both trigger the same
/// graceful-shutdown sequence (spec.md §4.7) instead of killing the
/// process via the OS default handler.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn persist_voice_registry(config: &mut config::Config, registry: &VoiceRegistry) -> std::io::Result<()> {
    config.voice_registry = registry.snapshot();
    write_config(config)
}
