//! `listen()` operation: capture stream, VAD-driven state machine, and
//! transcription (spec.md §4.4). `speak_then_listen`'s nudge-on-timeout
//! composition lives in `state.rs`, since it needs both this pipeline and
//! the speech pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::audio::{audio_ring_buffer, mic_arbiter::ListenAcquire, start_capture, MicArbiter, ReadyCue};
use crate::cancel::CancelToken;
use crate::error::RpcError;
use crate::transcribe::SttAdapter;
use crate::vad::{VadEngine, CARRY_SAMPLES, FRAME_SAMPLES};

/// How long the mic arbiter gives a running wake-word worker to yield
/// before taking the device over anyway (spec.md §4.4 step 3).
const WAKE_WORD_YIELD_BOUND: Duration = Duration::from_millis(500);

const SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub timeout_secs: f64,
    pub silence_threshold_secs: f64,
    pub vad_threshold: f32,
    pub device_name: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15.0,
            silence_threshold_secs: 1.5,
            vad_threshold: 0.3,
            device_name: None,
        }
    }
}

pub struct ListenOutcome {
    pub text: String,
    pub confidence: f32,
    pub duration_ms: u64,
    pub transcription_ms: u64,
}

enum CaptureOutcome {
    Speech(Vec<f32>),
    Timeout,
    Cancelled,
}

#[derive(PartialEq, Eq)]
enum State {
    WaitingForSpeech,
    Recording,
}

pub struct ListenPipeline {
    arbiter: Arc<MicArbiter>,
    stt: Arc<SttAdapter>,
    vad: Arc<Mutex<Box<dyn VadEngine>>>,
    muted: Arc<AtomicBool>,
}

impl ListenPipeline {
    pub fn new(arbiter: Arc<MicArbiter>, stt: Arc<SttAdapter>, vad: Box<dyn VadEngine>, muted: Arc<AtomicBool>) -> Self {
        Self {
            arbiter,
            stt,
            vad: Arc::new(Mutex::new(vad)),
            muted,
        }
    }

    /// Run one full listen cycle. `suppress_ready_cue` is set by the HTTP
    /// `/listen` endpoint, whose external push-to-talk trigger already
    /// provides its own cue (spec.md §4.4 step 4).
    pub async fn listen(
        &self,
        cfg: ListenConfig,
        cancel: CancelToken,
        suppress_ready_cue: bool,
    ) -> Result<ListenOutcome, RpcError> {
        if self.muted.load(Ordering::Acquire) {
            return Err(RpcError::muted());
        }

        match self.arbiter.acquire_for_listen(WAKE_WORD_YIELD_BOUND).await {
            ListenAcquire::Busy => return Err(RpcError::mic_busy()),
            ListenAcquire::Acquired => {}
        }

        let result = self.run(cfg, cancel, suppress_ready_cue).await;
        self.arbiter.release();
        result
    }

    async fn run(
        &self,
        cfg: ListenConfig,
        cancel: CancelToken,
        suppress_ready_cue: bool,
    ) -> Result<ListenOutcome, RpcError> {
        let listen_start = Instant::now();
        if !suppress_ready_cue {
            if let Ok(cue) = ReadyCue::new() {
                cue.play(880.0, 120);
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
        }

        let vad = Arc::clone(&self.vad);
        let capture = tokio::task::spawn_blocking(move || capture_until_finalised(&cfg, &cancel, &vad))
            .await
            .map_err(|e| {
                warn!("listen capture task panicked: {e}");
                RpcError::engine_unavailable("audio capture")
            })?;

        let audio = match capture {
            CaptureOutcome::Speech(audio) => audio,
            CaptureOutcome::Timeout => return Err(RpcError::timeout()),
            CaptureOutcome::Cancelled => return Err(RpcError::cancelled()),
        };

        let transcribe_start = Instant::now();
        let transcription = self.stt.transcribe(&audio).await.map_err(|e| {
            warn!("transcription failed: {e}");
            RpcError::engine_unavailable("transcription")
        })?;
        let transcription_ms = transcribe_start.elapsed().as_millis() as u64;

        Ok(ListenOutcome {
            text: transcription.text,
            confidence: transcription.confidence,
            duration_ms: listen_start.elapsed().as_millis() as u64,
            transcription_ms,
        })
    }
}

/// Runs entirely on a blocking thread: owns the capture stream and ring
/// buffer consumer for the duration of one listen cycle, so the `cpal`
/// stream never has to cross an await point.
fn capture_until_finalised(cfg: &ListenConfig, cancel: &CancelToken, vad: &Arc<Mutex<Box<dyn VadEngine>>>) -> CaptureOutcome {
    let (producer, mut consumer) = audio_ring_buffer(None);
    let _stream = match start_capture(producer, cfg.device_name.as_deref()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("failed to start capture for listen: {e}");
            return CaptureOutcome::Timeout;
        }
    };

    let mut state = State::WaitingForSpeech;
    let mut carry = vec![0.0f32; CARRY_SAMPLES];
    let mut recorded: Vec<f32> = Vec::new();
    let mut silence_run_secs = 0.0f64;
    let frame_duration_secs = FRAME_SAMPLES as f64 / SAMPLE_RATE as f64;
    let waiting_started = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return CaptureOutcome::Cancelled;
        }

        if state == State::WaitingForSpeech && waiting_started.elapsed().as_secs_f64() >= cfg.timeout_secs {
            return CaptureOutcome::Timeout;
        }

        if consumer.available() < FRAME_SAMPLES {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }

        let mut frame = vec![0.0f32; FRAME_SAMPLES];
        consumer.pop_slice(&mut frame);

        let (_, probability, new_carry) = vad.lock().unwrap().process(&frame, &carry, "recording");
        carry = new_carry;
        let is_speech = probability >= cfg.vad_threshold;

        match state {
            State::WaitingForSpeech => {
                if is_speech {
                    state = State::Recording;
                    recorded.extend_from_slice(&frame);
                    silence_run_secs = 0.0;
                }
            }
            State::Recording => {
                recorded.extend_from_slice(&frame);
                if is_speech {
                    silence_run_secs = 0.0;
                } else {
                    silence_run_secs += frame_duration_secs;
                    if silence_run_secs >= cfg.silence_threshold_secs {
                        info!(samples = recorded.len(), "listen finalising on silence");
                        return CaptureOutcome::Speech(recorded);
                    }
                }
            }
        }
    }
}
