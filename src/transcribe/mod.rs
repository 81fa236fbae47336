//! Speech-to-Text adapters.
//!
//! Provides a common `SttEngine` trait with implementations for:
//! - Local whisper.cpp inference (behind `native-ml` feature)
//! - OpenAI Whisper API (cloud)
//! - Custom user-configured API endpoint (cloud)
//! - A deterministic fake for tests

pub mod cloud;
pub mod fake;
pub mod whisper;

use std::path::Path;

/// A transcription result: text plus `exp(avg_logprob)` clamped to
/// `[0, 1]` (spec.md §4.4's confidence definition).
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
}

impl Transcription {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Common trait for all STT engines.
#[allow(async_fn_in_trait)]
pub trait SttEngine: Send + Sync {
    /// Transcribe 16 kHz mono f32 audio to text with a confidence score.
    async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<Transcription>;
}

/// Enum-dispatch wrapper over all STT backends.
///
/// This avoids dyn-compatibility issues with async trait methods.
pub enum SttAdapter {
    Whisper(whisper::WhisperStt),
    OpenAi(cloud::OpenAiStt),
    Custom(cloud::CustomApiStt),
    Fake(fake::FakeStt),
}

impl SttAdapter {
    /// Transcribe audio using the underlying engine.
    pub async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<Transcription> {
        match self {
            Self::Whisper(e) => e.transcribe(audio).await,
            Self::OpenAi(e) => e.transcribe(audio).await,
            Self::Custom(e) => e.transcribe(audio).await,
            Self::Fake(e) => e.transcribe(audio).await,
        }
    }
}

/// Create an STT engine from config values.
///
/// `adapter` is one of: "whisper-local", "openai-cloud", "custom-cloud", "fake".
pub fn create_stt_engine(
    adapter: &str,
    data_dir: &Path,
    model_size: Option<&str>,
    api_key: Option<&str>,
    endpoint: Option<&str>,
) -> anyhow::Result<SttAdapter> {
    match adapter {
        "whisper-local" => {
            let size = model_size.unwrap_or("base");
            let model_path = data_dir
                .join("models")
                .join(format!("ggml-{}.en.bin", size));
            let engine = whisper::WhisperStt::new(&model_path)?;
            Ok(SttAdapter::Whisper(engine))
        }
        "openai-cloud" => {
            let key = api_key
                .ok_or_else(|| anyhow::anyhow!("OpenAI STT requires an API key"))?;
            Ok(SttAdapter::OpenAi(cloud::OpenAiStt::new(key)))
        }
        "custom-cloud" => {
            let url = endpoint
                .ok_or_else(|| anyhow::anyhow!("Custom STT requires an endpoint URL"))?;
            let key = api_key.map(|s| s.to_string());
            Ok(SttAdapter::Custom(cloud::CustomApiStt::new(url, key)))
        }
        "fake" => Ok(SttAdapter::Fake(fake::FakeStt::new())),
        other => anyhow::bail!("Unknown STT adapter: {}", other),
    }
}
