//! Parley - Voice interaction session engine
//!
//! This library provides the core functionality for Parley:
//! - Voice activity detection and audio capture/playback
//! - Continuous-dialog sessions with barge-in interruption
//! - Dictation sessions that stream recognized text into an editor
//! - Wake-phrase listening
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Sessions                         │
//! │     Wake  │  Dialog (turns)  │  Dictation           │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Audio engine                        │
//! │  Capture │ VAD │ Pre-buffer │ Interrupts │ Playback │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Clients                            │
//! │   Recognition (STT) │ Response (LLM) │ Synthesis    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod buffer;
pub mod clients;
pub mod config;
pub mod error;
pub mod host;
pub mod monitor;
pub mod session;
pub mod task;
pub mod wake;

pub use audio::{
    AudioCapture, AudioFormat, AudioPlayback, AudioSegment, CaptureSource, DeviceOutput,
    MicSource, PlaybackHandle, SAMPLE_RATE, SampleEncoding, SpeechOutput, VadConfig,
    VoiceFeatures, classify, extract_features,
};
pub use buffer::{DEFAULT_CAPACITY, PreRecordingBuffer, PreSpeechTap, RollingAudioBuffer};
pub use clients::{
    ChatClient, RecognitionClient, ResponseClient, SpeechToText, SynthesisClient, TextToSpeech,
};
pub use config::Config;
pub use error::{Error, Result};
pub use host::{
    BufferEditor, FileStore, LogReporter, NoteEditor, Persistence, StatusLevel, StatusReporter,
};
pub use monitor::{BackgroundInterruptMonitor, InterruptConfig, InterruptDetector, InterruptWatch};
pub use session::{
    DialogConfig, DialogDeps, DialogOutcome, DialogSession, DialogState, DictationConfig,
    DictationOutcome, DictationSession, SessionSummaryBuilder, TriggerPhrase, Turn,
    format_transcript,
};
pub use task::Ticker;
pub use wake::{WakeConfig, WakeListener, WakeTrigger, match_wake_phrase};
