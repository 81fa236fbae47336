//! Public `speak` / `speak_then_listen` operations (spec.md §4.3).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::RpcError;
use crate::voice_registry::VoiceRegistry;

use super::queue::{QueuedSpeech, SpeechOutcome, SpeechQueue};

pub struct SpeakResult {
    pub voice_id: String,
    pub newly_assigned: bool,
    pub queued: bool,
    pub synth_ms: Option<u64>,
    pub playback_ms: Option<u64>,
}

pub struct SpeechPipeline {
    queue: SpeechQueue,
    voice_registry: Arc<VoiceRegistry>,
    muted: Arc<AtomicBool>,
}

impl SpeechPipeline {
    pub fn new(queue: SpeechQueue, voice_registry: Arc<VoiceRegistry>, muted: Arc<AtomicBool>) -> Self {
        Self {
            queue,
            voice_registry,
            muted,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    /// Kill current playback and drain the queue; returns whether
    /// anything was actually interrupted.
    pub fn stop(&self) -> bool {
        let active = self.queue.is_active();
        self.queue.stop();
        active
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// `agent_name` must match `session_name` (this process's own
    /// identity) or the call fails with a name-occupied error naming the
    /// session that actually owns this process (spec.md §4.3).
    pub async fn speak(
        &self,
        agent_name: &str,
        session_name: &str,
        text: &str,
        speed: f32,
        block: bool,
    ) -> Result<SpeakResult, RpcError> {
        if !agent_name.eq_ignore_ascii_case(session_name) {
            let voice = self
                .voice_registry
                .get(session_name)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(RpcError::name_occupied(session_name, &voice));
        }

        let had_voice_before = self.voice_registry.get(agent_name).is_some();
        let voice_id = self.voice_registry.resolve(agent_name);
        let newly_assigned = !had_voice_before;

        if self.is_muted() {
            return Ok(SpeakResult {
                voice_id,
                newly_assigned,
                queued: false,
                synth_ms: None,
                playback_ms: None,
            });
        }

        if !block {
            self.queue.enqueue(QueuedSpeech {
                text: text.to_string(),
                speed,
                completion: None,
            });
            return Ok(SpeakResult {
                voice_id,
                newly_assigned,
                queued: true,
                synth_ms: None,
                playback_ms: None,
            });
        }

        let (tx, rx) = oneshot::channel();
        self.queue.enqueue(QueuedSpeech {
            text: text.to_string(),
            speed,
            completion: Some(tx),
        });

        let outcome: SpeechOutcome = rx
            .await
            .map_err(|_| RpcError::cancelled())??;

        Ok(SpeakResult {
            voice_id,
            newly_assigned,
            queued: false,
            synth_ms: Some(outcome.synth_ms),
            playback_ms: Some(outcome.playback_ms),
        })
    }
}
