//! Continuous-dialog session
//!
//! One session runs on a single task and drives every collaborator itself:
//! capture for recording, the interrupt monitor and pre-recording buffer
//! while assistant audio plays, and the network clients in between. cpal
//! streams are not `Send`, so the whole session future stays `?Send` and
//! runs on the main thread.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::audio::{AudioSegment, CaptureSource, SpeechOutput, VadConfig, classify};
use crate::buffer::{PreSpeechTap, SEGMENT_DURATION};
use crate::clients::{RecognitionClient, ResponseClient, SynthesisClient};
use crate::host::{NoteEditor, Persistence, StatusLevel, StatusReporter};
use crate::monitor::InterruptWatch;
use crate::session::summary::SessionSummaryBuilder;
use crate::session::turn::Turn;
use crate::task::Ticker;

/// Spoken phrase that rewrites the prompt for the turn it appears in
#[derive(Debug, Clone)]
pub struct TriggerPhrase {
    /// Matched case-insensitively as a substring of the transcript
    pub phrase: String,
    /// Prepended to the transcript as an instruction when matched
    pub instruction: String,
}

/// Dialog session settings
#[derive(Debug, Clone)]
pub struct DialogConfig {
    /// Length of one recording phase
    pub capture_duration: Duration,
    /// How long to wait for the next turn before ending the session
    pub silence_window: Duration,
    /// Whether responses are synthesized and played
    pub synthesis_enabled: bool,
    /// Whether playback can be barged into
    pub interruption_enabled: bool,
    /// Speech classification settings for the waiting phase
    pub vad: VadConfig,
    /// Prompt-rewriting phrases, first match wins
    pub trigger_phrases: Vec<TriggerPhrase>,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            capture_duration: Duration::from_secs(5),
            silence_window: Duration::from_secs(20),
            synthesis_enabled: true,
            interruption_enabled: true,
            vad: VadConfig::default(),
            trigger_phrases: Vec::new(),
        }
    }
}

/// Where the session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Idle,
    Recording,
    Recognizing,
    Responding,
    Playing,
    WaitingForNextTurn,
    Ended,
}

/// What a finished session produced
#[derive(Debug)]
pub struct DialogOutcome {
    /// Completed turns over the whole session
    pub turns: usize,
    /// Where the transcript landed, if any turn completed
    pub persisted_to: Option<PathBuf>,
}

/// Everything a session borrows from its host
pub struct DialogDeps<'a> {
    pub capture: &'a mut dyn CaptureSource,
    pub output: &'a mut dyn SpeechOutput,
    pub monitor: &'a mut dyn InterruptWatch,
    pub prebuffer: &'a mut dyn PreSpeechTap,
    pub recognizer: &'a dyn RecognitionClient,
    pub responder: &'a dyn ResponseClient,
    pub synthesizer: &'a dyn SynthesisClient,
    pub reporter: &'a dyn StatusReporter,
    pub persistence: &'a dyn Persistence,
}

/// Continuous-dialog state machine
pub struct DialogSession<'a> {
    config: DialogConfig,
    deps: DialogDeps<'a>,
    state: DialogState,
    turns: Vec<Turn>,
    session_id: Option<String>,
    file_name: String,
}

impl<'a> DialogSession<'a> {
    /// Create an idle session
    pub fn new(config: DialogConfig, deps: DialogDeps<'a>) -> Self {
        let file_name = format!("dialog-{}.md", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
        Self {
            config,
            deps,
            state: DialogState::Idle,
            turns: Vec::new(),
            session_id: None,
            file_name,
        }
    }

    /// Tag the session as wake-triggered
    #[must_use]
    pub fn wake_triggered(mut self, session_id: String, file_name: String) -> Self {
        self.session_id = Some(session_id);
        self.file_name = file_name;
        self
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> DialogState {
        self.state
    }

    /// Turns completed so far
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Session id, present only for wake-triggered sessions
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Run the session until the silence window expires or `cancel` fires
    ///
    /// Always reaches [`DialogState::Ended`] and runs the summary and
    /// persistence path when at least one turn completed, including on
    /// manual cancellation and on device failures: teardown and persistence
    /// happen before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns error only on capture or device failures; recognition,
    /// response, and synthesis failures are reported and skip the turn.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<DialogOutcome> {
        self.deps.reporter.notify("dialog started", StatusLevel::Info);
        let result = self.drive(cancel).await;
        let outcome = self.finish().await;
        result?;
        outcome
    }

    /// Turn loop; every exit returns to [`run`], which always tears down
    async fn drive(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut pending_audio: Option<AudioSegment> = None;

        while !cancel.is_cancelled() {
            let audio = match pending_audio.take() {
                Some(audio) => audio,
                None => {
                    self.state = DialogState::Recording;
                    self.deps
                        .capture
                        .capture(self.config.capture_duration, cancel)
                        .await?
                }
            };
            if cancel.is_cancelled() {
                break;
            }

            // An interruption hands back audio that goes straight to
            // recognition, skipping the waiting phase.
            if let Some(followup) = self.take_turn(audio, cancel).await? {
                pending_audio = Some(followup);
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }

            self.state = DialogState::WaitingForNextTurn;
            match self.wait_for_speech(cancel).await? {
                Some(next) => pending_audio = Some(next),
                None => break,
            }
        }

        Ok(())
    }

    /// Record one turn immediately, inserting the exchange into `editor`
    ///
    /// Single-turn mode skips the waiting phase, barge-in monitoring, and
    /// session persistence; the result lands in the note instead.
    ///
    /// # Errors
    ///
    /// Returns error on capture or device failures
    pub async fn run_single_turn(
        &mut self,
        editor: &mut dyn NoteEditor,
        cancel: &CancellationToken,
    ) -> Result<Option<Turn>> {
        self.deps.reporter.notify("listening", StatusLevel::Info);
        self.state = DialogState::Recording;
        let audio = self
            .deps
            .capture
            .capture(self.config.capture_duration, cancel)
            .await?;

        self.state = DialogState::Recognizing;
        let Some(text) = self.recognize(&audio).await else {
            self.state = DialogState::Idle;
            return Ok(None);
        };

        self.state = DialogState::Responding;
        let Some(reply) = self.respond(&text).await else {
            self.state = DialogState::Idle;
            return Ok(None);
        };

        let turn = Turn::new(text, reply);
        editor.insert_at_cursor(&format!(
            "**Q:** {}\n\n**A:** {}\n\n",
            turn.user_text, turn.assistant_text
        ));

        if self.config.synthesis_enabled {
            self.state = DialogState::Playing;
            match self.deps.synthesizer.synthesize(&turn.assistant_text).await {
                Ok(mp3) => {
                    if let Err(e) = self.deps.output.begin(&mp3) {
                        self.deps.reporter.notify(
                            &format!("audio playback failed: {e}"),
                            StatusLevel::Warning,
                        );
                    } else {
                        self.wait_playback(cancel).await;
                    }
                }
                Err(e) => {
                    self.deps
                        .reporter
                        .notify(&format!("speech synthesis failed: {e}"), StatusLevel::Warning);
                }
            }
        }

        self.state = DialogState::Idle;
        Ok(Some(turn))
    }

    /// Recognize, respond, and optionally play; returns interruption audio
    async fn take_turn(
        &mut self,
        audio: AudioSegment,
        cancel: &CancellationToken,
    ) -> Result<Option<AudioSegment>> {
        self.state = DialogState::Recognizing;
        let Some(text) = self.recognize(&audio).await else {
            return Ok(None);
        };

        self.state = DialogState::Responding;
        let Some(reply) = self.respond(&text).await else {
            return Ok(None);
        };

        self.turns.push(Turn::new(text, reply.clone()));
        tracing::debug!(turns = self.turns.len(), "turn completed");

        if !self.config.synthesis_enabled {
            return Ok(None);
        }
        self.state = DialogState::Playing;
        self.speak(&reply, cancel).await
    }

    async fn recognize(&self, audio: &AudioSegment) -> Option<String> {
        match self.deps.recognizer.transcribe(audio).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    self.deps
                        .reporter
                        .notify("no speech recognized", StatusLevel::Warning);
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) => {
                self.deps
                    .reporter
                    .notify(&format!("voice recognition failed: {e}"), StatusLevel::Warning);
                None
            }
        }
    }

    async fn respond(&self, text: &str) -> Option<String> {
        let prompt = self.apply_trigger_phrases(text);
        match self.deps.responder.generate(&prompt).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                self.deps.reporter.notify(
                    &format!("response generation failed: {e}"),
                    StatusLevel::Warning,
                );
                None
            }
        }
    }

    /// Prepend the first matching trigger instruction to the transcript
    fn apply_trigger_phrases(&self, transcript: &str) -> String {
        let lower = transcript.to_lowercase();
        for trigger in &self.config.trigger_phrases {
            if !trigger.phrase.is_empty() && lower.contains(&trigger.phrase.to_lowercase()) {
                tracing::debug!(phrase = %trigger.phrase, "trigger phrase matched");
                return format!("{}\n\n{transcript}", trigger.instruction);
            }
        }
        transcript.to_string()
    }

    /// Play a reply while watching for barge-in
    ///
    /// On interruption, playback stops, the pre-recording buffer is
    /// snapshotted, and a fresh capture is prepended with the buffered
    /// onset so the first words of the barge-in survive.
    async fn speak(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<AudioSegment>> {
        let mp3 = match self.deps.synthesizer.synthesize(text).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.deps
                    .reporter
                    .notify(&format!("speech synthesis failed: {e}"), StatusLevel::Warning);
                return Ok(None);
            }
        };

        if let Err(e) = self.deps.output.begin(&mp3) {
            self.deps
                .reporter
                .notify(&format!("audio playback failed: {e}"), StatusLevel::Warning);
            return Ok(None);
        }

        self.deps.prebuffer.clear();
        self.deps.prebuffer.start()?;
        let monitoring = self.config.interruption_enabled;
        if monitoring {
            self.deps.monitor.start()?;
        }

        let mut ticker = Ticker::new(self.deps.monitor.poll_interval(), cancel.clone());
        let mut last_segment = tokio::time::Instant::now();

        loop {
            if !ticker.tick().await {
                self.deps.output.stop();
                self.deps.monitor.stop();
                return Ok(None);
            }

            if last_segment.elapsed() >= SEGMENT_DURATION {
                self.deps.prebuffer.tick();
                last_segment = tokio::time::Instant::now();
            }

            if monitoring && self.deps.monitor.poll() {
                self.deps.output.stop();
                self.deps
                    .reporter
                    .notify("interrupted, listening", StatusLevel::Info);

                let onset = self.deps.prebuffer.snapshot();
                self.deps.prebuffer.clear();
                self.state = DialogState::Recording;
                let fresh = self
                    .deps
                    .capture
                    .capture(self.config.capture_duration, cancel)
                    .await?;
                let segments = match onset {
                    Some(onset) => vec![onset, fresh],
                    None => vec![fresh],
                };
                return Ok(AudioSegment::concat(&segments));
            }

            if !self.deps.output.is_active() {
                self.deps.monitor.stop();
                return Ok(None);
            }
        }
    }

    /// Watch the pre-recording tap for speech until the silence window expires
    ///
    /// Returns the buffered onset plus a fresh capture when speech is
    /// accepted, `None` on deadline expiry or cancellation.
    async fn wait_for_speech(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<AudioSegment>> {
        self.deps.prebuffer.clear();
        self.deps.prebuffer.start()?;
        let mut ticker = Ticker::new(SEGMENT_DURATION, cancel.clone());
        let deadline = tokio::time::Instant::now() + self.config.silence_window;

        loop {
            if !ticker.tick().await {
                return Ok(None);
            }
            if tokio::time::Instant::now() >= deadline {
                self.deps
                    .reporter
                    .notify("no speech, ending dialog", StatusLevel::Info);
                return Ok(None);
            }

            let Some(segment) = self.deps.prebuffer.tick() else {
                continue;
            };
            if !classify(&segment, &self.config.vad) {
                continue;
            }

            let onset = self.deps.prebuffer.snapshot();
            self.deps.prebuffer.clear();
            self.state = DialogState::Recording;
            let fresh = self
                .deps
                .capture
                .capture(self.config.capture_duration, cancel)
                .await?;
            let segments = match onset {
                Some(onset) => vec![onset, fresh],
                None => vec![fresh],
            };
            return Ok(AudioSegment::concat(&segments));
        }
    }

    /// Tear down collaborators and persist the session
    async fn finish(&mut self) -> Result<DialogOutcome> {
        self.state = DialogState::Ended;
        self.deps.monitor.stop();
        self.deps.prebuffer.stop();
        self.deps.output.stop();

        let persisted_to = if self.turns.is_empty() {
            None
        } else {
            let content = SessionSummaryBuilder::new()
                .finalize(&self.turns, self.deps.responder)
                .await;
            match self.deps.persistence.write_session(&self.file_name, &content) {
                Ok(path) => {
                    self.deps.reporter.notify(
                        &format!("session saved to {}", path.display()),
                        StatusLevel::Success,
                    );
                    Some(path)
                }
                Err(e) => {
                    self.deps
                        .reporter
                        .notify(&format!("failed to save session: {e}"), StatusLevel::Error);
                    None
                }
            }
        };

        let outcome = DialogOutcome {
            turns: self.turns.len(),
            persisted_to,
        };
        self.turns.clear();
        self.session_id = None;
        self.deps.reporter.notify(
            &format!("dialog ended after {} turns", outcome.turns),
            StatusLevel::Info,
        );
        Ok(outcome)
    }

    async fn wait_playback(&mut self, cancel: &CancellationToken) {
        let mut ticker = Ticker::new(Duration::from_millis(50), cancel.clone());
        while self.deps.output.is_active() {
            if !ticker.tick().await {
                self.deps.output.stop();
                return;
            }
        }
    }
}
