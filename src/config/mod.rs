//! Process configuration: `<state>/config.json`.

pub mod paths;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::get_data_dir;

/// Default port the session registry starts claiming ports from.
pub const DEFAULT_HTTP_PORT_BASE: u16 = 7865;

/// Engine selection and credentials for synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub output_device: Option<String>,
}

/// Engine selection and credentials for transcription, plus VAD tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default = "default_vad_threshold")]
    pub vad_threshold: f32,
    /// Input device name passed to `cpal`; `None` uses the system default.
    #[serde(default)]
    pub input_device: Option<String>,
}

fn default_vad_threshold() -> f32 {
    0.3
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            api_key: None,
            endpoint: None,
            model_name: None,
            vad_threshold: default_vad_threshold(),
            input_device: None,
        }
    }
}

/// Top-level `config.json` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Preferred session name, falls back to `last_voice_name` then a
    /// built-in default when no other process holds it (§4.2 reconciliation).
    #[serde(default = "default_main_agent")]
    pub main_agent: String,
    /// Last explicitly chosen name, persisted across restarts.
    #[serde(default)]
    pub last_voice_name: Option<String>,
    #[serde(default = "default_http_port_base")]
    pub http_port_base: u16,
    #[serde(default)]
    pub mute_on_start: bool,
    #[serde(default)]
    pub wake_word_enabled: bool,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub stt: SttConfig,
    /// Optional pre-seed of the voice registry (agent_name -> voice_id).
    #[serde(default)]
    pub voice_registry: std::collections::HashMap<String, String>,
}

fn default_main_agent() -> String {
    "assistant".to_string()
}

fn default_http_port_base() -> u16 {
    DEFAULT_HTTP_PORT_BASE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_agent: default_main_agent(),
            last_voice_name: None,
            http_port_base: default_http_port_base(),
            mute_on_start: false,
            wake_word_enabled: false,
            tts: TtsConfig::default(),
            stt: SttConfig::default(),
            voice_registry: Default::default(),
        }
    }
}

/// Read `config.json` from the data directory; missing or malformed
/// content degrades to `Config::default()`.
pub fn read_config() -> Config {
    read_json_file(&get_config_path()).unwrap_or_default()
}

/// Write `config.json` back, e.g. after `last_voice_name` changes.
pub fn write_config(cfg: &Config) -> std::io::Result<()> {
    let path = get_config_path();
    let json = serde_json::to_string_pretty(cfg)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, &path)
}

pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

pub fn get_sessions_path() -> PathBuf {
    get_data_dir().join("sessions.json")
}

/// Generic helper: read a JSON file and deserialize it. Missing file is
/// silent; malformed file warns and is treated as absent.
pub(crate) fn read_json_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}
