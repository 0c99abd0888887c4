//! Pre-recording audio history
//!
//! While assistant audio is playing, the words a user speaks just before a
//! barge-in is detected would otherwise be lost. A rolling buffer of short
//! segments keeps that audio available: on interruption the session
//! snapshots the buffer and prepends it to the fresh capture.

use std::collections::VecDeque;
use std::time::Duration;

use crate::Result;
use crate::audio::{AudioCapture, AudioFormat, AudioSegment};

/// Default ring capacity in segments (~2s of history at 200ms segments)
pub const DEFAULT_CAPACITY: usize = 10;

/// Default duration of one buffered segment
pub const SEGMENT_DURATION: Duration = Duration::from_millis(200);

/// Fixed-capacity FIFO of audio segments, oldest evicted beyond capacity
#[derive(Debug)]
pub struct RollingAudioBuffer {
    segments: VecDeque<AudioSegment>,
    capacity: usize,
}

impl RollingAudioBuffer {
    /// Create a buffer holding at most `capacity` segments
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            segments: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append a segment, evicting exactly the oldest beyond capacity
    pub fn push(&mut self, segment: AudioSegment) {
        if self.segments.len() == self.capacity {
            self.segments.pop_front();
        }
        self.segments.push_back(segment);
    }

    /// Concatenate current contents in order, `None` if empty
    #[must_use]
    pub fn concat(&self) -> Option<AudioSegment> {
        let (front, back) = self.segments.as_slices();
        let all: Vec<AudioSegment> = front.iter().chain(back.iter()).cloned().collect();
        AudioSegment::concat(&all)
    }

    /// Number of buffered segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the buffer holds no segments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drop all buffered segments
    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

/// Rolling tap of recent microphone audio
///
/// While started, the owner drives [`tick`](PreSpeechTap::tick) at roughly
/// [`SEGMENT_DURATION`]; each tick drains the live capture buffer into the
/// ring and hands back the drained segment. `snapshot` never stops capture,
/// so buffering continues through an interruption handoff.
pub trait PreSpeechTap {
    /// Begin rolling capture; idempotent while running
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream fails to start
    fn start(&mut self) -> Result<()>;

    /// Drain live audio into the ring, returning the segment just buffered
    ///
    /// Call at segment cadence while started. Returns `None` when stopped or
    /// when no audio arrived since the last tick.
    fn tick(&mut self) -> Option<AudioSegment>;

    /// Concatenate buffered audio without stopping capture
    fn snapshot(&self) -> Option<AudioSegment>;

    /// Drop buffered history (e.g. after it was consumed by a new recording)
    fn clear(&mut self);

    /// Stop capture and release the device; buffered contents are kept
    fn stop(&mut self);

    /// Whether rolling capture is active
    fn is_running(&self) -> bool;
}

/// Microphone-backed [`PreSpeechTap`]
pub struct PreRecordingBuffer {
    capture: AudioCapture,
    ring: RollingAudioBuffer,
    running: bool,
}

impl PreRecordingBuffer {
    /// Create a buffer over the default input device
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            capture: AudioCapture::new()?,
            ring: RollingAudioBuffer::new(capacity),
            running: false,
        })
    }
}

impl PreSpeechTap for PreRecordingBuffer {
    fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.capture.clear_buffer();
        self.capture.start()?;
        self.running = true;
        tracing::debug!(capacity = self.ring.capacity, "pre-recording buffer started");
        Ok(())
    }

    fn tick(&mut self) -> Option<AudioSegment> {
        if !self.running {
            return None;
        }
        let samples = self.capture.take_buffer();
        if samples.is_empty() {
            return None;
        }
        let segment = AudioSegment::from_samples(&samples, AudioFormat::speech());
        self.ring.push(segment.clone());
        Some(segment)
    }

    fn snapshot(&self) -> Option<AudioSegment> {
        self.ring.concat()
    }

    fn clear(&mut self) {
        self.ring.clear();
    }

    fn stop(&mut self) {
        if self.running {
            self.capture.stop();
            self.running = false;
            tracing::debug!("pre-recording buffer stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
