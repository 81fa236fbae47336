//! Deterministic synthesis fake for tests: produces a tone whose length
//! is proportional to the input text, with no model or network access.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use super::TtsEngine;

const SAMPLE_RATE: usize = 16_000;

pub struct FakeTts {
    voice: String,
    stopped: AtomicBool,
}

impl FakeTts {
    pub fn new(voice: &str) -> Self {
        Self {
            voice: voice.to_string(),
            stopped: AtomicBool::new(false),
        }
    }
}

impl TtsEngine for FakeTts {
    fn speak(&self, text: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<f32>>> + Send + '_>> {
        let samples_per_char = SAMPLE_RATE / 50;
        let len = text.chars().count().max(1) * samples_per_char;
        Box::pin(async move {
            if self.stopped.load(Ordering::Acquire) {
                anyhow::bail!("synthesis stopped");
            }
            Ok((0..len)
                .map(|i| (i as f32 * 0.01).sin() * 0.1)
                .collect())
        })
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn name(&self) -> String {
        format!("Fake ({})", self.voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn longer_text_produces_longer_audio() {
        let tts = FakeTts::new("af_heart");
        let short = tts.speak("hi").await.unwrap();
        let long = tts.speak("a much longer sentence than the first one").await.unwrap();
        assert!(long.len() > short.len());
    }
}
