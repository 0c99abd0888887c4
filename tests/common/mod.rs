//! Shared test utilities
//!
//! Scripted stand-ins for the audio devices and network clients, so session
//! behavior is testable without hardware or network.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use parley::{
    AudioFormat, AudioSegment, CaptureSource, Error, InterruptWatch, Persistence, PreSpeechTap,
    RecognitionClient, ResponseClient, Result, SAMPLE_RATE, SpeechOutput, StatusLevel,
    StatusReporter, SynthesisClient,
};

/// A loud constant-amplitude segment that classifies as speech
#[must_use]
pub fn speech_segment(duration: Duration) -> AudioSegment {
    let n = (u128::from(SAMPLE_RATE) * duration.as_millis() / 1000) as usize;
    AudioSegment::from_samples(&vec![0.5; n], AudioFormat::speech())
}

/// An all-zero segment that classifies as silence
#[must_use]
pub fn silence_segment(duration: Duration) -> AudioSegment {
    let n = (u128::from(SAMPLE_RATE) * duration.as_millis() / 1000) as usize;
    AudioSegment::from_samples(&vec![0.0; n], AudioFormat::speech())
}

/// Capture source that replays a fixed sequence, then silence
pub struct ScriptedCapture {
    segments: VecDeque<AudioSegment>,
    fail_when_empty: bool,
    pub calls: usize,
}

impl ScriptedCapture {
    #[must_use]
    pub fn new(segments: Vec<AudioSegment>) -> Self {
        Self {
            segments: segments.into(),
            fail_when_empty: false,
            calls: 0,
        }
    }

    /// Like `new`, but captures past the script fail like a lost device
    #[must_use]
    pub fn failing_after(segments: Vec<AudioSegment>) -> Self {
        Self {
            fail_when_empty: true,
            ..Self::new(segments)
        }
    }
}

#[async_trait(?Send)]
impl CaptureSource for ScriptedCapture {
    async fn capture(
        &mut self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<AudioSegment> {
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = cancel.cancelled() => {}
        }
        self.calls += 1;
        match self.segments.pop_front() {
            Some(segment) => Ok(segment),
            None if self.fail_when_empty => Err(Error::Audio("input device lost".to_string())),
            None => Ok(silence_segment(duration)),
        }
    }
}

/// Pre-speech tap fed from a fixed tick script
pub struct ScriptedTap {
    script: VecDeque<AudioSegment>,
    ring: Vec<AudioSegment>,
    running: bool,
}

impl ScriptedTap {
    /// Segments handed out one per tick; ticks past the script yield `None`
    #[must_use]
    pub fn new(script: Vec<AudioSegment>) -> Self {
        Self {
            script: script.into(),
            ring: Vec::new(),
            running: false,
        }
    }
}

impl PreSpeechTap for ScriptedTap {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn tick(&mut self) -> Option<AudioSegment> {
        if !self.running {
            return None;
        }
        let segment = self.script.pop_front()?;
        self.ring.push(segment.clone());
        Some(segment)
    }

    fn snapshot(&self) -> Option<AudioSegment> {
        AudioSegment::concat(&self.ring)
    }

    fn clear(&mut self) {
        self.ring.clear();
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Interrupt watch that fires at a fixed poll count, once
pub struct ScriptedMonitor {
    fire_at: Option<u32>,
    polls: u32,
    running: bool,
}

impl ScriptedMonitor {
    /// `fire_at` is the 1-based poll at which the interruption fires
    #[must_use]
    pub fn new(fire_at: Option<u32>) -> Self {
        Self {
            fire_at,
            polls: 0,
            running: false,
        }
    }
}

impl InterruptWatch for ScriptedMonitor {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        self.polls = 0;
        Ok(())
    }

    fn poll(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.polls += 1;
        if self.fire_at == Some(self.polls) {
            self.fire_at = None;
            self.running = false;
            return true;
        }
        false
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(100)
    }
}

/// Speech output whose utterances last a scripted number of activity polls
#[derive(Default)]
pub struct ScriptedOutput {
    durations: VecDeque<u32>,
    remaining: Cell<u32>,
    pub begun: Vec<Vec<u8>>,
    pub stops_while_active: u32,
}

impl ScriptedOutput {
    /// Each `begin` consumes one entry: the number of `is_active` polls the
    /// utterance survives. `u32::MAX` plays until stopped.
    #[must_use]
    pub fn new(durations: Vec<u32>) -> Self {
        Self {
            durations: durations.into(),
            ..Self::default()
        }
    }
}

impl SpeechOutput for ScriptedOutput {
    fn begin(&mut self, mp3: &[u8]) -> Result<()> {
        self.begun.push(mp3.to_vec());
        self.remaining.set(self.durations.pop_front().unwrap_or(0));
        Ok(())
    }

    fn is_active(&self) -> bool {
        let left = self.remaining.get();
        if left == 0 {
            return false;
        }
        if left != u32::MAX {
            self.remaining.set(left - 1);
        }
        true
    }

    fn stop(&mut self) {
        if self.remaining.get() > 0 {
            self.stops_while_active += 1;
        }
        self.remaining.set(0);
    }
}

/// Recognition client that replays scripted results
pub struct MockRecognizer {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    pub calls: AtomicUsize,
}

impl MockRecognizer {
    #[must_use]
    pub fn new(script: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionClient for MockRecognizer {
    async fn transcribe(&self, _audio: &AudioSegment) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(Error::Stt(msg)),
            None => Ok(String::new()),
        }
    }
}

/// Response client that echoes prompts back, recording them
#[derive(Default)]
pub struct EchoResponder {
    pub prompts: Mutex<Vec<String>>,
    pub fail: bool,
}

impl EchoResponder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ResponseClient for EchoResponder {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(Error::Llm("scripted failure".to_string()));
        }
        Ok(format!("re: {prompt}"))
    }
}

/// Synthesis client returning fixed bytes, or failing
#[derive(Default)]
pub struct MockSynthesizer {
    pub fail: bool,
}

impl MockSynthesizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SynthesisClient for MockSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        if self.fail {
            return Err(Error::Tts("scripted failure".to_string()));
        }
        Ok(vec![0u8; 16])
    }
}

/// Persistence backend that keeps writes in memory
#[derive(Default)]
pub struct MemoryStore {
    pub writes: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryStore {
    fn write_session(&self, name: &str, content: &str) -> Result<PathBuf> {
        self.writes
            .lock()
            .unwrap()
            .push((name.to_string(), content.to_string()));
        Ok(PathBuf::from(name))
    }
}

/// Status reporter that swallows everything
pub struct SilentReporter;

impl StatusReporter for SilentReporter {
    fn notify(&self, _message: &str, _level: StatusLevel) {}
}
