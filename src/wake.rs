//! Wake-phrase listening
//!
//! Short capture segments go through recognition and are scanned for a
//! configured phrase. A match plays a spoken acknowledgment (never
//! persisted) and hands the caller an identity for the dialog session that
//! follows.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::audio::{CaptureSource, SpeechOutput, VadConfig, classify};
use crate::clients::{RecognitionClient, SynthesisClient};
use crate::host::{StatusLevel, StatusReporter};
use crate::task::Ticker;

/// Wake listening settings
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Phrases matched case-insensitively against each transcript
    pub phrases: Vec<String>,
    /// Length of one listening segment
    pub segment_duration: Duration,
    /// Spoken acknowledgment on a match
    pub ack_text: String,
    /// Speech pre-filter; silent segments skip recognition
    pub vad: VadConfig,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrases: vec!["hey assistant".to_string()],
            segment_duration: Duration::from_millis(2000),
            ack_text: "Yes?".to_string(),
            vad: VadConfig::default(),
        }
    }
}

/// What a wake match hands to the dialog session
#[derive(Debug, Clone)]
pub struct WakeTrigger {
    /// The phrase that matched
    pub phrase: String,
    /// Full transcript the phrase was found in
    pub transcript: String,
    /// Fresh id for the wake-triggered session
    pub session_id: String,
    /// Generated file name for the session transcript
    pub file_name: String,
}

/// Listens for a wake phrase on the microphone
pub struct WakeListener<'a> {
    config: WakeConfig,
    capture: &'a mut dyn CaptureSource,
    recognizer: &'a dyn RecognitionClient,
    synthesizer: &'a dyn SynthesisClient,
    output: &'a mut dyn SpeechOutput,
    reporter: &'a dyn StatusReporter,
}

impl<'a> WakeListener<'a> {
    pub fn new(
        config: WakeConfig,
        capture: &'a mut dyn CaptureSource,
        recognizer: &'a dyn RecognitionClient,
        synthesizer: &'a dyn SynthesisClient,
        output: &'a mut dyn SpeechOutput,
        reporter: &'a dyn StatusReporter,
    ) -> Self {
        Self {
            config,
            capture,
            recognizer,
            synthesizer,
            output,
            reporter,
        }
    }

    /// Listen until a phrase matches or `cancel` fires
    ///
    /// Recognition failures are logged and listening continues; only
    /// cancellation or a match ends the loop.
    ///
    /// # Errors
    ///
    /// Returns error on capture failures
    pub async fn listen(&mut self, cancel: &CancellationToken) -> Result<Option<WakeTrigger>> {
        self.reporter
            .notify("listening for wake phrase", StatusLevel::Info);

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let segment = self
                .capture
                .capture(self.config.segment_duration, cancel)
                .await?;
            if cancel.is_cancelled() {
                return Ok(None);
            }

            if !classify(&segment, &self.config.vad) {
                continue;
            }

            let transcript = match self.recognizer.transcribe(&segment).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(error = %e, "wake recognition failed");
                    continue;
                }
            };

            let Some(phrase) = match_wake_phrase(&transcript, &self.config.phrases) else {
                continue;
            };
            tracing::info!(phrase = %phrase, "wake phrase detected");
            let phrase = phrase.to_string();

            self.acknowledge(cancel).await;

            let session_id = uuid::Uuid::new_v4().to_string();
            let file_name = format!(
                "dialog-{}-{}.md",
                chrono::Utc::now().format("%Y%m%d-%H%M%S"),
                &session_id[..8]
            );
            return Ok(Some(WakeTrigger {
                phrase,
                transcript,
                session_id,
                file_name,
            }));
        }
    }

    /// Play the spoken acknowledgment to completion
    ///
    /// The acknowledgment is UI feedback only; it never enters the session
    /// transcript. Synthesis failure degrades to a status message.
    async fn acknowledge(&mut self, cancel: &CancellationToken) {
        match self.synthesizer.synthesize(&self.config.ack_text).await {
            Ok(mp3) => {
                if self.output.begin(&mp3).is_ok() {
                    let mut ticker = Ticker::new(Duration::from_millis(50), cancel.clone());
                    while self.output.is_active() {
                        if !ticker.tick().await {
                            self.output.stop();
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "wake acknowledgment synthesis failed");
                self.reporter
                    .notify(&self.config.ack_text, StatusLevel::Info);
            }
        }
    }
}

/// Case-insensitive substring match of any phrase in `transcript`
#[must_use]
pub fn match_wake_phrase<'p>(transcript: &str, phrases: &'p [String]) -> Option<&'p str> {
    let lower = transcript.to_lowercase();
    phrases
        .iter()
        .filter(|p| !p.is_empty())
        .find(|p| lower.contains(&p.to_lowercase()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_is_case_insensitive() {
        let phrases = vec!["Hey Assistant".to_string()];
        assert_eq!(
            match_wake_phrase("okay HEY ASSISTANT what's up", &phrases),
            Some("Hey Assistant")
        );
    }

    #[test]
    fn test_substring_match_inside_sentence() {
        let phrases = vec!["computer".to_string()];
        assert!(match_wake_phrase("hello computer please", &phrases).is_some());
        assert!(match_wake_phrase("hello there", &phrases).is_none());
    }

    #[test]
    fn test_empty_phrase_never_matches() {
        let phrases = vec![String::new()];
        assert!(match_wake_phrase("anything", &phrases).is_none());
    }
}
