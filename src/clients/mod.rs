//! External collaborator interfaces
//!
//! The session engine only ever talks to recognition, response, and
//! synthesis through these traits; the concrete HTTP clients live beside
//! them. Tests substitute scripted implementations.

mod llm;
mod stt;
mod tts;

use async_trait::async_trait;

use crate::Result;
use crate::audio::AudioSegment;

pub use llm::ChatClient;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

/// Audio in, transcript out
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    /// Transcribe one audio segment
    ///
    /// An empty transcript is a valid success; the caller decides whether
    /// that constitutes a failed turn.
    async fn transcribe(&self, audio: &AudioSegment) -> Result<String>;
}

/// Prompt in, response text out
#[async_trait]
pub trait ResponseClient: Send + Sync {
    /// Generate a response for the given prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Text in, playable audio bytes out
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Synthesize speech for the given text (MP3 bytes)
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
