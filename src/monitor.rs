//! Background interruption detection during playback
//!
//! While assistant audio plays, a live input tap is polled at the configured
//! sensitivity interval. A single loud poll (door slam, click) must not stop
//! playback, so an interruption requires a run of consecutive above-threshold
//! readings. The monitor fires at most once per start and then stops itself.

use std::time::Duration;

use crate::Result;
use crate::audio::AudioCapture;

/// Interruption sensitivity settings
#[derive(Debug, Clone, Copy)]
pub struct InterruptConfig {
    /// Average-amplitude threshold on the 0-255 scale
    pub volume_threshold: f32,
    /// Poll cadence, clamped to 50-500ms on config load
    pub poll_interval: Duration,
    /// Consecutive above-threshold polls required to fire
    pub consecutive_polls: u32,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 40.0,
            poll_interval: Duration::from_millis(100),
            consecutive_polls: 3,
        }
    }
}

/// Pure run-length trigger over amplitude readings
///
/// Fires exactly once: after the required run is reached, further readings
/// are ignored until [`reset`](Self::reset).
#[derive(Debug)]
pub struct InterruptDetector {
    threshold: f32,
    required: u32,
    consecutive: u32,
    fired: bool,
}

impl InterruptDetector {
    /// Create a detector for the given threshold and run length
    #[must_use]
    pub fn new(config: &InterruptConfig) -> Self {
        Self {
            threshold: config.volume_threshold,
            required: config.consecutive_polls.max(1),
            consecutive: 0,
            fired: false,
        }
    }

    /// Feed one amplitude reading; returns true exactly when the run completes
    pub fn observe(&mut self, average_amplitude: f32) -> bool {
        if self.fired {
            return false;
        }

        if average_amplitude > self.threshold {
            self.consecutive += 1;
            if self.consecutive >= self.required {
                self.fired = true;
                return true;
            }
        } else {
            self.consecutive = 0;
        }

        false
    }

    /// Whether the detector has already fired
    #[must_use]
    pub const fn has_fired(&self) -> bool {
        self.fired
    }

    /// Re-arm for a new monitoring pass
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.fired = false;
    }
}

/// Barge-in detection as the session sees it
///
/// The session polls at [`poll_interval`](Self::poll_interval) cadence while
/// playback is active; once an interruption is reported the monitor has
/// stopped itself and must be started again for subsequent monitoring.
pub trait InterruptWatch {
    /// Begin monitoring; idempotent while running
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream fails to start
    fn start(&mut self) -> Result<()>;

    /// Poll once; returns true exactly when an interruption fires
    fn poll(&mut self) -> bool;

    /// Stop monitoring; after this returns no interruption can be reported
    fn stop(&mut self);

    /// Poll cadence for the owning loop
    fn poll_interval(&self) -> Duration;
}

/// Live-audio interruption monitor
///
/// Owns its own input tap so it can run concurrently with playback and the
/// pre-recording buffer.
pub struct BackgroundInterruptMonitor {
    capture: AudioCapture,
    detector: InterruptDetector,
    config: InterruptConfig,
    running: bool,
}

impl BackgroundInterruptMonitor {
    /// Create a monitor over the default input device
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    pub fn new(config: InterruptConfig) -> Result<Self> {
        Ok(Self {
            capture: AudioCapture::new()?,
            detector: InterruptDetector::new(&config),
            config,
            running: false,
        })
    }

    /// Whether monitoring is active
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }
}

impl InterruptWatch for BackgroundInterruptMonitor {
    fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.detector.reset();
        self.capture.clear_buffer();
        self.capture.start()?;
        self.running = true;
        tracing::debug!(
            threshold = self.config.volume_threshold,
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "interrupt monitor started"
        );
        Ok(())
    }

    fn poll(&mut self) -> bool {
        if !self.running {
            return false;
        }

        let samples = self.capture.take_buffer();
        let amplitude = average_amplitude(&samples);

        if self.detector.observe(amplitude) {
            tracing::info!(amplitude, "interruption detected");
            self.stop();
            return true;
        }
        false
    }

    fn stop(&mut self) {
        if self.running {
            self.capture.stop();
            self.running = false;
            tracing::debug!("interrupt monitor stopped");
        }
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

/// Mean absolute amplitude on the 0-255 scale
#[allow(clippy::cast_precision_loss)]
fn average_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32 * 255.0
}
