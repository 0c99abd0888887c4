//! Audio primitives
//!
//! Capture, playback, segment representation, and the voice-activity
//! classifier shared by the dialog and dictation sessions.

mod capture;
mod playback;
mod segment;
pub mod vad;

pub use capture::{AudioCapture, CaptureSource, MicSource};
pub use playback::{AudioPlayback, DeviceOutput, PlaybackHandle, SpeechOutput};
pub use segment::{AudioFormat, AudioSegment, SAMPLE_RATE, SampleEncoding};
pub use vad::{VadConfig, VoiceFeatures, classify, extract_features};
