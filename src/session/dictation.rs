//! Dictation session
//!
//! Continuous capture in short segments. Speech segments accumulate; a
//! pause flushes the accumulated audio through recognition and inserts the
//! text at the editor cursor, and a long enough silence ends the session.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::audio::{AudioSegment, CaptureSource, VadConfig, classify};
use crate::clients::RecognitionClient;
use crate::host::{NoteEditor, StatusLevel, StatusReporter};

/// Dictation session settings
#[derive(Debug, Clone)]
pub struct DictationConfig {
    /// Length of one capture segment
    pub segment_duration: Duration,
    /// Silence after speech that triggers a recognition flush
    pub silence_interval: Duration,
    /// Total silence that ends the session
    pub silence_timeout: Duration,
    /// Speech classification settings
    pub vad: VadConfig,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            segment_duration: Duration::from_millis(500),
            silence_interval: Duration::from_secs(2),
            silence_timeout: Duration::from_secs(10),
            vad: VadConfig::default(),
        }
    }
}

/// How a dictation session ended and what it produced
#[derive(Debug)]
pub struct DictationOutcome {
    /// All recognized text, in insertion order
    pub text: String,
    /// True when the silence timeout ended the session rather than the user
    pub ended_by_timeout: bool,
}

/// Speech-to-editor dictation loop
pub struct DictationSession<'a> {
    config: DictationConfig,
    capture: &'a mut dyn CaptureSource,
    recognizer: &'a dyn RecognitionClient,
    reporter: &'a dyn StatusReporter,
}

impl<'a> DictationSession<'a> {
    pub fn new(
        config: DictationConfig,
        capture: &'a mut dyn CaptureSource,
        recognizer: &'a dyn RecognitionClient,
        reporter: &'a dyn StatusReporter,
    ) -> Self {
        Self {
            config,
            capture,
            recognizer,
            reporter,
        }
    }

    /// Run until the silence timeout expires or `cancel` fires
    ///
    /// Manual cancellation discards audio accumulated since the last flush;
    /// only a silence-triggered flush commits text to the editor.
    ///
    /// # Errors
    ///
    /// Returns error on capture failures; recognition failures are reported
    /// and the affected audio is dropped.
    pub async fn run(
        &mut self,
        editor: &mut dyn NoteEditor,
        cancel: &CancellationToken,
    ) -> Result<DictationOutcome> {
        self.reporter.notify("dictation started", StatusLevel::Info);

        let mut accumulated: Vec<AudioSegment> = Vec::new();
        let mut recognized = String::new();
        let mut last_speech = tokio::time::Instant::now();
        let mut ended_by_timeout = false;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let segment = self
                .capture
                .capture(self.config.segment_duration, cancel)
                .await?;
            if cancel.is_cancelled() {
                break;
            }

            if classify(&segment, &self.config.vad) {
                accumulated.push(segment);
                last_speech = tokio::time::Instant::now();
                continue;
            }

            let silence = last_speech.elapsed();
            if !accumulated.is_empty() && silence >= self.config.silence_interval {
                self.flush(&mut accumulated, &mut recognized, editor).await;
            }
            if silence >= self.config.silence_timeout {
                self.reporter
                    .notify("silence timeout, ending dictation", StatusLevel::Info);
                ended_by_timeout = true;
                break;
            }
        }

        if recognized.is_empty() {
            self.reporter
                .notify("no speech recognized", StatusLevel::Warning);
        } else {
            self.reporter.notify("dictation ended", StatusLevel::Success);
        }

        Ok(DictationOutcome {
            text: recognized,
            ended_by_timeout,
        })
    }

    /// Recognize accumulated audio and insert it at the cursor
    ///
    /// The accumulation is cleared whether or not recognition succeeds, so
    /// a failed flush never replays stale audio.
    async fn flush(
        &mut self,
        accumulated: &mut Vec<AudioSegment>,
        recognized: &mut String,
        editor: &mut dyn NoteEditor,
    ) {
        let Some(joined) = AudioSegment::concat(accumulated) else {
            return;
        };
        accumulated.clear();

        match self.recognizer.transcribe(&joined).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::debug!("flush recognized no text");
                    return;
                }
                let chunk = format!("{text} ");
                editor.insert_at_cursor(&chunk);
                recognized.push_str(&chunk);
                tracing::debug!(chars = chunk.len(), "dictation chunk inserted");
            }
            Err(e) => {
                self.reporter
                    .notify(&format!("voice recognition failed: {e}"), StatusLevel::Warning);
            }
        }
    }
}
