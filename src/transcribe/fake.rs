//! Deterministic transcription fake: echoes back a fixed phrase sized
//! to the input audio length so tests can assert on non-empty input
//! without decoding real speech.

use super::{SttEngine, Transcription};

pub struct FakeStt;

impl FakeStt {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FakeStt {
    fn default() -> Self {
        Self::new()
    }
}

impl SttEngine for FakeStt {
    async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<Transcription> {
        if audio.is_empty() {
            return Ok(Transcription::new("", 0.0));
        }
        Ok(Transcription::new("test transcription", 0.9))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_audio_yields_empty_text() {
        let stt = FakeStt::new();
        let result = stt.transcribe(&[]).await.unwrap();
        assert_eq!(result.text, "");
    }
}
