//! Configuration management
//!
//! Every value resolves env > toml > default. Detection and timing values
//! have hard ranges; out-of-range values are clamped with a warning rather
//! than rejected, so a bad config file never prevents startup.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::audio::VadConfig;
use crate::monitor::InterruptConfig;
use crate::session::{DialogConfig, DictationConfig, TriggerPhrase};
use crate::wake::WakeConfig;

/// Volume threshold bounds on the 0-255 amplitude scale
const THRESHOLD_RANGE: (f32, f32) = (10.0, 80.0);

/// Interrupt poll interval bounds in ms
const SENSITIVITY_RANGE: (u64, u64) = (50, 500);

/// Dictation flush-interval bounds in ms
const DICTATION_INTERVAL_RANGE: (u64, u64) = (1000, 5000);

/// Dictation end-timeout bounds in seconds
const DICTATION_TIMEOUT_RANGE: (u64, u64) = (5, 30);

/// Wake listening segment bounds in ms
const WAKE_SEGMENT_RANGE: (u64, u64) = (500, 5000);

/// Parley configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Speech detection settings
    pub detection: DetectionConfig,

    /// Dialog session settings
    pub dialog: DialogSettings,

    /// Dictation session settings
    pub dictation: DictationSettings,

    /// Wake phrase settings
    pub wake: WakeSettings,

    /// Voice provider selection
    pub voice: VoiceConfig,

    /// LLM settings
    pub llm: LlmConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Directory for persisted session transcripts
    pub notes_dir: PathBuf,
}

/// Speech detection settings
#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    /// Volume threshold on the 0-255 scale (10-80)
    pub threshold: f32,

    /// Interrupt poll interval (50-500ms)
    pub sensitivity: Duration,

    /// Whether playback can be barged into
    pub interruption_enabled: bool,

    /// Pre-recording ring capacity in segments
    pub prebuffer_capacity: usize,
}

/// Dialog session settings
#[derive(Debug, Clone)]
pub struct DialogSettings {
    /// Length of one recording phase
    pub capture_duration: Duration,

    /// Whether responses are synthesized and played
    pub synthesis_enabled: bool,

    /// Prompt-rewriting trigger phrases
    pub trigger_phrases: Vec<TriggerPhrase>,
}

/// Dictation session settings
#[derive(Debug, Clone, Copy)]
pub struct DictationSettings {
    /// Silence after speech that triggers a recognition flush (1-5s)
    pub silence_interval: Duration,

    /// Total silence that ends the session (5-30s)
    pub silence_timeout: Duration,
}

/// Wake phrase settings
#[derive(Debug, Clone)]
pub struct WakeSettings {
    /// Phrases matched against each listening segment
    pub phrases: Vec<String>,

    /// Listening segment length (500-5000ms)
    pub segment_duration: Duration,

    /// Spoken acknowledgment text
    pub ack_text: String,

    /// Whether a match starts a dialog session automatically
    pub auto_dialog: bool,
}

/// Voice provider selection
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: String,

    /// STT model
    pub stt_model: String,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: String,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,
}

/// LLM settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API root of an OpenAI-compatible endpoint
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// System prompt sent with every request
    pub system_prompt: Option<String>,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, TTS, and the default chat endpoint)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration (env > toml > default)
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();

        let detection = DetectionConfig {
            threshold: clamp_f32(
                "detection threshold",
                env_parse("PARLEY_THRESHOLD").or(fc.detection.threshold).unwrap_or(30.0),
                THRESHOLD_RANGE,
            ),
            sensitivity: Duration::from_millis(clamp_u64(
                "sensitivity interval",
                env_parse("PARLEY_SENSITIVITY_MS")
                    .or(fc.detection.sensitivity_ms)
                    .unwrap_or(100),
                SENSITIVITY_RANGE,
            )),
            interruption_enabled: env_bool("PARLEY_INTERRUPTION")
                .or(fc.detection.interruption_enabled)
                .unwrap_or(true),
            prebuffer_capacity: env_parse("PARLEY_PREBUFFER_CAPACITY")
                .or(fc.detection.prebuffer_capacity)
                .unwrap_or(crate::buffer::DEFAULT_CAPACITY),
        };

        let dialog = DialogSettings {
            capture_duration: Duration::from_secs(
                env_parse("PARLEY_CAPTURE_SECS")
                    .or(fc.dialog.capture_secs)
                    .unwrap_or(5),
            ),
            synthesis_enabled: env_bool("PARLEY_SYNTHESIS")
                .or(fc.dialog.synthesis_enabled)
                .unwrap_or(true),
            trigger_phrases: fc
                .dialog
                .trigger_phrases
                .unwrap_or_default()
                .into_iter()
                .map(|t| TriggerPhrase {
                    phrase: t.phrase,
                    instruction: t.instruction,
                })
                .collect(),
        };

        let dictation = DictationSettings {
            silence_interval: Duration::from_millis(clamp_u64(
                "dictation flush interval",
                env_parse("PARLEY_DICTATION_INTERVAL_MS")
                    .or(fc.dictation.silence_interval_ms)
                    .unwrap_or(2000),
                DICTATION_INTERVAL_RANGE,
            )),
            silence_timeout: Duration::from_secs(clamp_u64(
                "dictation silence timeout",
                env_parse("PARLEY_DICTATION_TIMEOUT_SECS")
                    .or(fc.dictation.silence_timeout_secs)
                    .unwrap_or(10),
                DICTATION_TIMEOUT_RANGE,
            )),
        };

        let wake = WakeSettings {
            phrases: std::env::var("PARLEY_WAKE_PHRASES")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .or(fc.wake.phrases)
                .unwrap_or_else(|| vec!["hey assistant".to_string()]),
            segment_duration: Duration::from_millis(clamp_u64(
                "wake segment length",
                env_parse("PARLEY_WAKE_SEGMENT_MS")
                    .or(fc.wake.segment_ms)
                    .unwrap_or(2000),
                WAKE_SEGMENT_RANGE,
            )),
            ack_text: std::env::var("PARLEY_WAKE_ACK")
                .ok()
                .or(fc.wake.ack_text)
                .unwrap_or_else(|| "Yes?".to_string()),
            auto_dialog: env_bool("PARLEY_WAKE_AUTO_DIALOG")
                .or(fc.wake.auto_dialog)
                .unwrap_or(true),
        };

        let voice = VoiceConfig {
            stt_provider: std::env::var("PARLEY_STT_PROVIDER")
                .ok()
                .or(fc.voice.stt_provider)
                .unwrap_or_else(|| "whisper".to_string()),
            stt_model: std::env::var("PARLEY_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_provider: std::env::var("PARLEY_TTS_PROVIDER")
                .ok()
                .or(fc.voice.tts_provider)
                .unwrap_or_else(|| "openai".to_string()),
            tts_model: std::env::var("PARLEY_TTS_MODEL")
                .ok()
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: std::env::var("PARLEY_TTS_VOICE")
                .ok()
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: env_parse("PARLEY_TTS_SPEED")
                .or(fc.voice.tts_speed)
                .unwrap_or(1.0),
        };

        let llm = LlmConfig {
            base_url: std::env::var("PARLEY_LLM_URL")
                .ok()
                .or(fc.llm.base_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: std::env::var("PARLEY_LLM_MODEL")
                .ok()
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            system_prompt: std::env::var("PARLEY_SYSTEM_PROMPT")
                .ok()
                .or(fc.llm.system_prompt),
        };

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
        };

        let notes_dir = std::env::var("PARLEY_NOTES_DIR")
            .ok()
            .or(fc.notes_dir)
            .map_or_else(default_notes_dir, PathBuf::from);

        Self {
            detection,
            dialog,
            dictation,
            wake,
            voice,
            llm,
            api_keys,
            notes_dir,
        }
    }

    /// Voice-activity settings derived from detection config
    #[must_use]
    pub fn vad_config(&self) -> VadConfig {
        VadConfig {
            threshold: self.detection.threshold,
            ..VadConfig::default()
        }
    }

    /// Interrupt monitor settings derived from detection config
    #[must_use]
    pub fn interrupt_config(&self) -> InterruptConfig {
        InterruptConfig {
            volume_threshold: self.detection.threshold,
            poll_interval: self.detection.sensitivity,
            ..InterruptConfig::default()
        }
    }

    /// Dialog session settings
    #[must_use]
    pub fn dialog_config(&self) -> DialogConfig {
        DialogConfig {
            capture_duration: self.dialog.capture_duration,
            synthesis_enabled: self.dialog.synthesis_enabled,
            interruption_enabled: self.detection.interruption_enabled,
            vad: self.vad_config(),
            trigger_phrases: self.dialog.trigger_phrases.clone(),
            ..DialogConfig::default()
        }
    }

    /// Dictation session settings
    #[must_use]
    pub fn dictation_config(&self) -> DictationConfig {
        DictationConfig {
            silence_interval: self.dictation.silence_interval,
            silence_timeout: self.dictation.silence_timeout,
            vad: self.vad_config(),
            ..DictationConfig::default()
        }
    }

    /// Wake listening settings
    #[must_use]
    pub fn wake_config(&self) -> WakeConfig {
        WakeConfig {
            phrases: self.wake.phrases.clone(),
            segment_duration: self.wake.segment_duration,
            ack_text: self.wake.ack_text.clone(),
            vad: self.vad_config(),
        }
    }
}

/// Default transcript directory: `~/.local/share/parley/notes/`
fn default_notes_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("notes"),
        |d| d.data_dir().join("parley").join("notes"),
    )
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn clamp_u64(name: &str, value: u64, (min, max): (u64, u64)) -> u64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(name, value, min, max, "config value out of range, clamped");
    }
    clamped
}

fn clamp_f32(name: &str, value: f32, (min, max): (f32, f32)) -> f32 {
    let clamped = value.clamp(min, max);
    if (clamped - value).abs() > f32::EPSILON {
        tracing::warn!(name, value, min, max, "config value out of range, clamped");
    }
    clamped
}
