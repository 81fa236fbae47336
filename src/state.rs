//! `ServerState`: the single process-global value every pipeline and
//! handler shares, per spec.md §9's "no free-floating singletons" note.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::warn;

use crate::cancel::CancelToken;
use crate::catalogue;
use crate::config::Config;
use crate::error::{ErrorKind, RpcError};
use crate::listen::{ListenConfig, ListenOutcome, ListenPipeline};
use crate::session_registry::{RenameOutcome, SessionEntry, SessionRegistry};
use crate::speech::{SpeakResult, SpeechPipeline};
use crate::voice_registry::VoiceRegistry;
use crate::wake_word::{WakeWordListener, WakeWordState};

/// Spoken once when `speak_then_listen`'s listen phase times out
/// (spec.md §4.4).
const NUDGE_TEXT: &str = "Still there? Let me know when you're ready.";

pub struct SetVoiceResult {
    pub name: String,
    pub voice: String,
    pub previous_name: String,
}

pub struct SpeakThenListenResult {
    pub speak: Result<SpeakResult, RpcError>,
    pub listen: Result<ListenOutcome, RpcError>,
    pub nudge_spoken: bool,
}

pub struct EngineStatus {
    pub tts: Option<String>,
    pub stt: Option<String>,
    pub vad_loaded: bool,
}

pub struct WakeWordStatus {
    pub enabled: bool,
    pub listening: bool,
    pub model: String,
}

pub struct StatusSnapshot {
    pub engines: EngineStatus,
    pub muted: bool,
    pub uptime_s: u64,
    pub registry_size: usize,
    pub queue_depth: usize,
    pub session: SessionEntry,
    pub wake_word: Option<WakeWordStatus>,
}

pub struct ServerState {
    pub config: Config,
    pub voice_registry: Arc<VoiceRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub muted: Arc<AtomicBool>,
    pub speech: SpeechPipeline,
    pub listen: Arc<ListenPipeline>,
    pub own_entry: Arc<Mutex<SessionEntry>>,
    pub wake_word: Mutex<Option<Arc<WakeWordListener>>>,
    wake_word_model_name: String,
    engines: EngineStatus,
    started_at: Instant,
    cancels: Mutex<HashMap<String, CancelToken>>,
}

impl ServerState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        voice_registry: Arc<VoiceRegistry>,
        sessions: Arc<SessionRegistry>,
        speech: SpeechPipeline,
        listen: Arc<ListenPipeline>,
        own_entry: Arc<Mutex<SessionEntry>>,
        engines: EngineStatus,
        wake_word_model_name: String,
    ) -> Self {
        let muted = Arc::new(AtomicBool::new(config.mute_on_start));
        Self {
            config,
            voice_registry,
            sessions,
            muted,
            speech,
            listen,
            own_entry,
            wake_word: Mutex::new(None),
            wake_word_model_name,
            engines,
            started_at: Instant::now(),
            cancels: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_name(&self) -> String {
        self.own_entry.lock().unwrap().name.clone()
    }

    pub fn default_input_device(&self) -> Option<String> {
        self.config.stt.input_device.clone()
    }

    pub fn set_wake_word(&self, listener: Arc<WakeWordListener>) {
        *self.wake_word.lock().unwrap() = Some(listener);
    }

    // ---- cancellation registry, shared between per-request MCP
    // cancellation and the global `stop` tool ----

    pub fn register_cancel(&self, id: String, token: CancelToken) {
        self.cancels.lock().unwrap().insert(id, token);
    }

    pub fn unregister_cancel(&self, id: &str) {
        self.cancels.lock().unwrap().remove(id);
    }

    pub fn cancel_by_id(&self, id: &str) {
        if let Some(token) = self.cancels.lock().unwrap().get(id) {
            token.cancel();
        }
    }

    fn cancel_all(&self) -> bool {
        let map = self.cancels.lock().unwrap();
        let any = !map.is_empty();
        for token in map.values() {
            token.cancel();
        }
        any
    }

    // ---- tool operations ----

    pub async fn speak(&self, name: &str, text: &str, speed: f32, block: bool) -> Result<SpeakResult, RpcError> {
        let session_name = self.session_name();
        self.speech.speak(name, &session_name, text, speed, block).await
    }

    pub async fn listen(&self, cfg: ListenConfig, cancel: CancelToken, suppress_ready_cue: bool) -> Result<ListenOutcome, RpcError> {
        self.listen.listen(cfg, cancel, suppress_ready_cue).await
    }

    pub async fn speak_then_listen(
        &self,
        name: &str,
        text: &str,
        speed: f32,
        listen_cfg: ListenConfig,
        cancel: CancelToken,
    ) -> SpeakThenListenResult {
        let session_name = self.session_name();
        let speak = self.speech.speak(name, &session_name, text, speed, true).await;

        let listen = self.listen.listen(listen_cfg, cancel, false).await;
        let mut nudge_spoken = false;
        let listen = match listen {
            Err(e) if e.kind == ErrorKind::Timeout => {
                nudge_spoken = true;
                if let Err(nudge_err) = self.speech.speak(name, &session_name, NUDGE_TEXT, 1.0, true).await {
                    warn!("failed to speak listen-timeout nudge: {nudge_err}");
                }
                Err(e)
            }
            other => other,
        };

        SpeakThenListenResult { speak, listen, nudge_spoken }
    }

    pub fn set_voice(&self, name: &str, voice: &str) -> Result<SetVoiceResult, RpcError> {
        if !catalogue::is_known(voice) {
            return Err(RpcError::invalid_voice(voice));
        }
        let pid = std::process::id();
        let previous_name = self.session_name();
        match self.sessions.rename(pid, name) {
            Ok(RenameOutcome::NameOccupied(holder)) => {
                return Err(RpcError::name_occupied(&holder.name, &holder.voice_id));
            }
            Ok(RenameOutcome::NotFound) => {
                warn!("set_voice: own session entry not found in registry during rename");
            }
            Ok(RenameOutcome::Renamed) => {}
            Err(e) => warn!("failed to persist session rename: {e}"),
        }
        self.voice_registry.rename(&previous_name, name);
        self.voice_registry.set(name, voice).map_err(|_| RpcError::invalid_voice(voice))?;

        let mut entry = self.own_entry.lock().unwrap();
        entry.name = name.to_string();
        entry.voice_id = voice.to_string();

        Ok(SetVoiceResult {
            name: name.to_string(),
            voice: voice.to_string(),
            previous_name,
        })
    }

    pub fn get_voice_registry(&self) -> HashMap<String, String> {
        self.voice_registry.snapshot()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
        self.speech.set_muted(muted);
    }

    pub fn stop(&self) -> (bool, bool) {
        let cancelled_listen = self.cancel_all();
        let stopped_playback = self.speech.stop();
        (stopped_playback, cancelled_listen)
    }

    pub fn status(&self) -> StatusSnapshot {
        let registry_size = self.sessions.snapshot().map(|s| s.len()).unwrap_or(0);
        let wake_word = self.wake_word.lock().unwrap().as_ref().map(|w| WakeWordStatus {
            enabled: w.is_enabled(),
            listening: w.state() != WakeWordState::Disabled,
            model: self.wake_word_model_name.clone(),
        });
        StatusSnapshot {
            engines: EngineStatus {
                tts: self.engines.tts.clone(),
                stt: self.engines.stt.clone(),
                vad_loaded: self.engines.vad_loaded,
            },
            muted: self.is_muted(),
            uptime_s: self.started_at.elapsed().as_secs(),
            registry_size,
            queue_depth: self.speech.queue_depth(),
            session: self.own_entry.lock().unwrap().clone(),
            wake_word,
        }
    }

    pub fn wake_enable(&self) -> bool {
        if let Some(w) = self.wake_word.lock().unwrap().as_ref() {
            w.enable();
            return w.state() == WakeWordState::Listening || w.is_enabled();
        }
        false
    }

    pub fn wake_disable(&self) -> bool {
        if let Some(w) = self.wake_word.lock().unwrap().as_ref() {
            w.disable();
        }
        false
    }

    pub async fn attach_session(&self, session_id: &str) -> std::io::Result<SessionEntry> {
        let pid = std::process::id();
        let sibling = self.sessions.attach_session_id(pid, session_id)?;
        let mut entry = self.own_entry.lock().unwrap();
        entry.session_id = Some(session_id.to_string());
        if let Some(sibling) = sibling {
            entry.name = sibling.name.clone();
            entry.voice_id = sibling.voice_id.clone();
        }
        Ok(entry.clone())
    }
}
