//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Speech detection configuration
    #[serde(default)]
    pub detection: DetectionFileConfig,

    /// Dialog session configuration
    #[serde(default)]
    pub dialog: DialogFileConfig,

    /// Dictation session configuration
    #[serde(default)]
    pub dictation: DictationFileConfig,

    /// Wake phrase configuration
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Voice provider configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Directory for persisted session transcripts
    #[serde(default)]
    pub notes_dir: Option<String>,
}

/// Speech detection configuration
#[derive(Debug, Default, Deserialize)]
pub struct DetectionFileConfig {
    /// Volume threshold on the 0-255 scale (clamped to 10-80)
    pub threshold: Option<f32>,

    /// Interrupt poll interval in ms (clamped to 50-500)
    pub sensitivity_ms: Option<u64>,

    /// Enable barge-in during playback
    pub interruption_enabled: Option<bool>,

    /// Pre-recording ring capacity in segments
    pub prebuffer_capacity: Option<usize>,
}

/// Dialog session configuration
#[derive(Debug, Default, Deserialize)]
pub struct DialogFileConfig {
    /// Length of one recording phase in seconds
    pub capture_secs: Option<u64>,

    /// Enable spoken responses
    pub synthesis_enabled: Option<bool>,

    /// Prompt-rewriting trigger phrases
    pub trigger_phrases: Option<Vec<TriggerPhraseFileConfig>>,
}

/// One trigger phrase entry
#[derive(Debug, Deserialize)]
pub struct TriggerPhraseFileConfig {
    pub phrase: String,
    pub instruction: String,
}

/// Dictation session configuration
#[derive(Debug, Default, Deserialize)]
pub struct DictationFileConfig {
    /// Silence that triggers a recognition flush, in ms (clamped to 1000-5000)
    pub silence_interval_ms: Option<u64>,

    /// Silence that ends the session, in seconds (clamped to 5-30)
    pub silence_timeout_secs: Option<u64>,
}

/// Wake phrase configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// Phrases matched against each listening segment
    pub phrases: Option<Vec<String>>,

    /// Listening segment length in ms (clamped to 500-5000)
    pub segment_ms: Option<u64>,

    /// Spoken acknowledgment text
    pub ack_text: Option<String>,

    /// Start a dialog session automatically on a match
    pub auto_dialog: Option<bool>,
}

/// Voice provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy", or an ElevenLabs voice id)
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// API root of an OpenAI-compatible endpoint
    pub base_url: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// System prompt sent with every request
    pub system_prompt: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    let Some(path) = config_file_path() else {
        return ParleyConfigFile::default();
    };

    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParleyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}
