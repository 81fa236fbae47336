//! Background wake-word worker (spec.md §4.5): owns its own capture
//! session whenever it holds the mic arbiter, detects the wake phrase,
//! records a follow-up utterance, and routes the transcribed text to a
//! sibling session's HTTP side-channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{info, warn};

use crate::audio::{audio_ring_buffer, i16_ring_buffer, start_capture, start_capture_i16, MicArbiter, ReadyCue};
use crate::session_registry::{SessionEntry, SessionRegistry};
use crate::transcribe::SttAdapter;
use crate::vad::{VadEngine, CARRY_SAMPLES, FRAME_SAMPLES};
use crate::wake_word::{WakeWordEngine, CHUNK_SAMPLES};

const SAMPLE_RATE: u32 = 16_000;

/// How often the detection loop re-checks `yield_requested`/`enabled`
/// between ring-buffer polls.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeWordState {
    Disabled,
    Listening,
    Recording,
    Injecting,
    Yielded,
}

pub struct WakeWordListener {
    state: Mutex<WakeWordState>,
    notify: Notify,
    enabled: AtomicBool,
    loaded: AtomicBool,
    arbiter: Arc<MicArbiter>,
    engine: Mutex<Box<dyn WakeWordEngine>>,
    vad: Mutex<Box<dyn VadEngine>>,
    stt: Arc<SttAdapter>,
    sessions: Arc<SessionRegistry>,
    http_client: reqwest::Client,
    model_dir: PathBuf,
    device_name: Option<String>,
    wake_threshold: f32,
    vad_threshold: f32,
    silence_threshold_secs: f64,
    own_entry: Arc<Mutex<SessionEntry>>,
    self_pid: u32,
}

impl WakeWordListener {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        arbiter: Arc<MicArbiter>,
        engine: Box<dyn WakeWordEngine>,
        vad: Box<dyn VadEngine>,
        stt: Arc<SttAdapter>,
        sessions: Arc<SessionRegistry>,
        model_dir: PathBuf,
        device_name: Option<String>,
        own_entry: Arc<Mutex<SessionEntry>>,
        start_enabled: bool,
    ) -> Arc<Self> {
        let listener = Arc::new(Self {
            state: Mutex::new(WakeWordState::Disabled),
            notify: Notify::new(),
            enabled: AtomicBool::new(start_enabled),
            loaded: AtomicBool::new(false),
            arbiter,
            engine: Mutex::new(engine),
            vad: Mutex::new(vad),
            stt,
            sessions,
            http_client: reqwest::Client::new(),
            model_dir,
            device_name,
            wake_threshold: 0.5,
            vad_threshold: 0.3,
            silence_threshold_secs: 1.5,
            self_pid: std::process::id(),
            own_entry,
        });
        let worker = Arc::clone(&listener);
        tokio::spawn(async move { worker.run().await });
        listener
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        self.set_state(WakeWordState::Disabled);
        self.notify.notify_waiters();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WakeWordState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: WakeWordState) {
        *self.state.lock().unwrap() = state;
    }

    async fn run(self: Arc<Self>) {
        loop {
            if !self.is_enabled() {
                self.set_state(WakeWordState::Disabled);
                self.notify.notified().await;
                continue;
            }

            if self.arbiter.yield_requested() {
                self.set_state(WakeWordState::Yielded);
                while self.is_enabled() && self.arbiter.yield_requested() {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                continue;
            }

            if !self.arbiter.try_acquire_wake_word() {
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }

            if !self.loaded.load(Ordering::Acquire) {
                let ok = self.engine.lock().unwrap().load(&self.model_dir);
                self.loaded.store(true, Ordering::Release);
                if !ok {
                    warn!("wake-word model failed to load — disabling wake word");
                    self.arbiter.release();
                    self.disable();
                    continue;
                }
            }

            self.set_state(WakeWordState::Listening);
            match self.listen_cycle().await {
                Ok(Some((text, target))) => {
                    self.set_state(WakeWordState::Injecting);
                    self.deliver(&text, &target).await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("wake-word worker failed, disabling: {e}");
                    self.arbiter.release();
                    self.disable();
                    continue;
                }
            }
            self.arbiter.release();
        }
    }

    /// Runs one `Listening` session: opens its own capture stream, feeds
    /// 1280-sample chunks to the wake-word adapter, and on trigger
    /// transitions through `Recording` in-line. Returns the routed text
    /// and its target, or `None` if the session ended via yield/disable
    /// without a trigger.
    async fn listen_cycle(self: &Arc<Self>) -> anyhow::Result<Option<(String, SessionEntry)>> {
        let me = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || me.detect_and_record()).await??;
        match result {
            Some(audio) => {
                let transcription = self.stt.transcribe(&audio).await?;
                let entries = self.sessions.snapshot().unwrap_or_default();
                let target = self.pick_target(&transcription.text, &entries);
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }

    /// Blocking: owns the capture stream. Returns `Ok(Some(audio))` when
    /// a wake trigger led to a finalised recording, `Ok(None)` if the
    /// session ended early (yield requested or disabled) with no trigger.
    ///
    /// Detection runs against an int16 stream. On trigger the int16
    /// stream is closed and any pending audio dropped before a fresh
    /// float32 stream is opened for `record_follow_up`.
    fn detect_and_record(self: &Arc<Self>) -> anyhow::Result<Option<Vec<f32>>> {
        let (producer, mut consumer) = i16_ring_buffer(None);
        let detect_stream = start_capture_i16(producer, self.device_name.as_deref())
            .map_err(|e| anyhow::anyhow!("wake-word capture: {e}"))?;

        loop {
            if !self.is_enabled() || self.arbiter.yield_requested() {
                return Ok(None);
            }

            if consumer.available() < CHUNK_SAMPLES {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }

            let mut chunk = vec![0i16; CHUNK_SAMPLES];
            consumer.pop_slice(&mut chunk);

            let (triggered, score) = self.engine.lock().unwrap().process(&chunk);
            if !triggered {
                continue;
            }
            info!(score, "wake word triggered");

            self.set_state(WakeWordState::Recording);
            // Close the int16 stream and drop anything still buffered
            // before opening the float32 one the follow-up recording uses.
            consumer.drain_all();
            drop(detect_stream);

            if let Ok(cue) = ReadyCue::new() {
                cue.play(880.0, 120);
                std::thread::sleep(Duration::from_millis(150));
            }

            let (record_producer, mut record_consumer) = audio_ring_buffer(None);
            let _record_stream = start_capture(record_producer, self.device_name.as_deref())
                .map_err(|e| anyhow::anyhow!("follow-up capture: {e}"))?;

            return Ok(Some(self.record_follow_up(&mut record_consumer)));
        }
    }

    fn record_follow_up(self: &Arc<Self>, consumer: &mut crate::audio::AudioConsumer) -> Vec<f32> {
        let mut carry = vec![0.0f32; CARRY_SAMPLES];
        let mut recorded: Vec<f32> = Vec::new();
        let mut silence_run_secs = 0.0f64;
        let frame_duration_secs = FRAME_SAMPLES as f64 / SAMPLE_RATE as f64;

        loop {
            if consumer.available() < FRAME_SAMPLES {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            let mut frame = vec![0.0f32; FRAME_SAMPLES];
            consumer.pop_slice(&mut frame);

            let (_, probability, new_carry) = self.vad.lock().unwrap().process(&frame, &carry, "recording");
            carry = new_carry;
            recorded.extend_from_slice(&frame);

            if probability >= self.vad_threshold {
                silence_run_secs = 0.0;
            } else {
                silence_run_secs += frame_duration_secs;
                if silence_run_secs >= self.silence_threshold_secs {
                    return recorded;
                }
            }
        }
    }

    /// Routing per spec.md §4.5: single live sibling gets everything;
    /// with multiple, a leading name token is stripped and used to pick
    /// the target, else fall back to the most recently started sibling.
    fn pick_target(&self, text: &str, entries: &[SessionEntry]) -> (String, SessionEntry) {
        let own = self.own_entry.lock().unwrap().clone();
        let siblings: Vec<&SessionEntry> = entries.iter().filter(|e| e.pid != self.self_pid).collect();

        if siblings.is_empty() {
            return (text.to_string(), own);
        }

        if let Some(first_word) = text.split_whitespace().next() {
            if let Some(target) = siblings.iter().find(|e| e.name.eq_ignore_ascii_case(first_word)) {
                let remainder = text[first_word.len()..].trim_start().to_string();
                return (remainder, (*target).clone());
            }
        }

        match self.sessions.most_recently_started(self.self_pid).ok().flatten() {
            Some(target) => (text.to_string(), target),
            None => (text.to_string(), own),
        }
    }

    async fn deliver(&self, text: &str, target: &SessionEntry) {
        let url = format!("http://127.0.0.1:{}/inject", target.port);
        let body = serde_json::json!({ "text": text });
        if let Err(e) = self.http_client.post(&url).json(&body).send().await {
            warn!(port = target.port, "failed to deliver wake-word text: {e}");
        }
    }
}
