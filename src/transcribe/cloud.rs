//! Cloud-based STT adapters (OpenAI Whisper API, custom endpoint).

use reqwest::multipart;
use tracing::debug;

use crate::wav::encode_wav;

use super::{SttEngine, Transcription};

/// OpenAI's `transcriptions` endpoint doesn't return per-segment
/// logprobs in the default `json` response format, so cloud adapters
/// report a fixed confidence rather than a measured one.
const CLOUD_DEFAULT_CONFIDENCE: f32 = 0.9;

// ---------------------------------------------------------------------------
// OpenAI Whisper API
// ---------------------------------------------------------------------------

/// OpenAI Whisper API STT adapter.
pub struct OpenAiStt {
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiStt {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl SttEngine for OpenAiStt {
    async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<Transcription> {
        let wav = encode_wav(audio, 16_000);
        debug!(bytes = wav.len(), "Sending audio to OpenAI Whisper API");

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let form = multipart::Form::new()
            .text("model", "whisper-1")
            .part("file", file_part);

        let resp = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI STT API error {}: {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(Transcription::new(text, CLOUD_DEFAULT_CONFIDENCE))
    }
}

// ---------------------------------------------------------------------------
// Custom API endpoint
// ---------------------------------------------------------------------------

/// User-configured custom STT endpoint.
pub struct CustomApiStt {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CustomApiStt {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

impl SttEngine for CustomApiStt {
    async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<Transcription> {
        let wav = encode_wav(audio, 16_000);
        debug!(
            bytes = wav.len(),
            endpoint = %self.endpoint,
            "Sending audio to custom STT endpoint"
        );

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let form = multipart::Form::new()
            .text("model", "whisper-1")
            .part("file", file_part);

        let mut req = self.client.post(&self.endpoint).multipart(form);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Custom STT API error {}: {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(Transcription::new(text, CLOUD_DEFAULT_CONFIDENCE))
    }
}
