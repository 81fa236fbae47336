//! The speech worker: a single consumer draining an unbounded FIFO of
//! synthesis+playback requests (spec.md §4.3), generalized from the
//! teacher's direct `speak_text`/`AppState` interruption pattern into an
//! explicit message-passing queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::audio::{spawn_playback, PlaybackHandle};
use crate::error::RpcError;
use crate::synth::{phrase_split, TtsEngine};

/// One synthesize-then-play request, already resolved to a concrete voice.
pub struct QueuedSpeech {
    pub text: String,
    pub speed: f32,
    pub completion: Option<oneshot::Sender<Result<SpeechOutcome, RpcError>>>,
}

#[derive(Debug, Clone)]
pub struct SpeechOutcome {
    pub synth_ms: u64,
    pub playback_ms: u64,
}

/// Handle shared with the dispatcher: enqueue new requests, or force
/// the in-flight one to stop and drain everything queued behind it.
pub struct SpeechQueue {
    sender: mpsc::UnboundedSender<QueuedSpeech>,
    current_playback: Arc<Mutex<Option<PlaybackHandle>>>,
    depth: Arc<AtomicUsize>,
    stopping: Arc<AtomicBool>,
}

impl SpeechQueue {
    pub fn enqueue(&self, item: QueuedSpeech) {
        // The receiver only drops once the worker task ends, which only
        // happens if the process is shutting down — a send error there
        // is inconsequential.
        self.depth.fetch_add(1, Ordering::AcqRel);
        let _ = self.sender.send(item);
    }

    /// Requests queued or currently synthesising/playing (`status` tool).
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether a request is currently synthesising or playing back, used
    /// by `stop` to report whether it actually interrupted anything.
    pub fn is_active(&self) -> bool {
        self.current_playback.lock().unwrap().is_some() || self.depth() > 0
    }

    /// Kill whatever is currently playing and drop everything still
    /// queued, per spec.md §9 open question 3 ("current intent is to
    /// abort"). Queued blocking callers are woken with a cancelled error.
    pub fn stop(&self) {
        if let Some(handle) = self.current_playback.lock().unwrap().as_mut() {
            handle.kill();
        }
        // Only arm draining if there's actually a backlog (queued or
        // in-flight); otherwise the flag would wait forever for an item
        // to clear it and spuriously cancel the next unrelated speak.
        if self.depth() > 0 {
            self.stopping.store(true, Ordering::Release);
        }
    }
}

/// Spawn the worker task and return the handle used to talk to it.
pub fn spawn_worker(
    synth: Arc<dyn TtsEngine>,
    output_device: Option<String>,
    configured_player: Option<String>,
    sample_rate: u32,
) -> SpeechQueue {
    let (sender, mut receiver) = mpsc::unbounded_channel::<QueuedSpeech>();
    let current_playback: Arc<Mutex<Option<PlaybackHandle>>> = Arc::new(Mutex::new(None));
    let stopping = Arc::new(AtomicBool::new(false));
    let depth = Arc::new(AtomicUsize::new(0));

    let worker_playback = Arc::clone(&current_playback);
    let worker_stopping = Arc::clone(&stopping);
    let worker_depth = Arc::clone(&depth);
    tokio::spawn(async move {
        while let Some(item) = receiver.recv().await {
            if worker_stopping.load(Ordering::Acquire) {
                // Drain without speaking until the backlog that existed
                // at stop() time is gone, then resume normal operation.
                if let Some(completion) = item.completion {
                    let _ = completion.send(Err(RpcError::cancelled()));
                }
                let remaining = worker_depth.fetch_sub(1, Ordering::AcqRel) - 1;
                if remaining == 0 {
                    worker_stopping.store(false, Ordering::Release);
                }
                continue;
            }

            let result = process_one(&item, &synth, output_device.as_deref(), configured_player.as_deref(), sample_rate, &worker_playback).await;
            let remaining = worker_depth.fetch_sub(1, Ordering::AcqRel) - 1;
            if remaining == 0 {
                worker_stopping.store(false, Ordering::Release);
            }
            if let Some(completion) = item.completion {
                let _ = completion.send(result);
            }
        }
        info!("speech worker exiting: queue closed");
    });

    SpeechQueue {
        sender,
        current_playback,
        depth,
        stopping,
    }
}

async fn process_one(
    item: &QueuedSpeech,
    synth: &Arc<dyn TtsEngine>,
    _output_device: Option<&str>,
    configured_player: Option<&str>,
    sample_rate: u32,
    current_playback: &Arc<Mutex<Option<PlaybackHandle>>>,
) -> Result<SpeechOutcome, RpcError> {
    let chunks = phrase_split::split(&item.text);
    let mut total_synth_ms = 0u64;
    let mut total_playback_ms = 0u64;

    for chunk in chunks {
        let synth_start = Instant::now();
        let samples = synth.speak(&chunk).await.map_err(|e| {
            warn!("synthesis failed, aborting request: {e}");
            RpcError::engine_unavailable("synthesis")
        })?;
        total_synth_ms += synth_start.elapsed().as_millis() as u64;

        let playback_start = Instant::now();
        let handle = spawn_playback(&samples, sample_rate, configured_player).map_err(|e| {
            error!("failed to start playback: {e}");
            RpcError::engine_unavailable("audio sink")
        })?;
        *current_playback.lock().unwrap() = Some(handle);
        let waiter = Arc::clone(current_playback);
        tokio::task::spawn_blocking(move || {
            if let Some(handle) = waiter.lock().unwrap().take() {
                let _ = handle.wait();
            }
        })
        .await
        .map_err(|e| {
            error!("playback wait task panicked: {e}");
            RpcError::engine_unavailable("audio sink")
        })?;
        total_playback_ms += playback_start.elapsed().as_millis() as u64;
    }

    Ok(SpeechOutcome {
        synth_ms: total_synth_ms,
        playback_ms: total_playback_ms,
    })
}
