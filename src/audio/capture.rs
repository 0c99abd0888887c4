//! Audio capture from microphone

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioFormat, AudioSegment, SAMPLE_RATE};
use crate::{Error, Result};

/// On-demand source of audio segments
///
/// The microphone is an exclusive resource: a session owns its source for
/// the duration of its recording phase. Implemented by [`MicSource`] for
/// hardware and by scripted sources in tests. `?Send` because cpal streams
/// are not `Send`; session futures run on the main thread.
#[async_trait(?Send)]
pub trait CaptureSource {
    /// Capture audio for up to `duration`
    ///
    /// Cancellation stops the capture early and yields whatever was
    /// buffered, so a recording phase never blocks session shutdown.
    async fn capture(&mut self, duration: Duration, cancel: &CancellationToken)
    -> Result<AudioSegment>;
}

/// Captures audio from the default input device
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let config = self.config.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio and release the device
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Get captured audio buffer and clear it
    ///
    /// Returns the audio samples captured since last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

/// Microphone-backed [`CaptureSource`]
///
/// Keeps the cpal stream open across captures; each call drains the buffer
/// so segments never overlap.
pub struct MicSource {
    capture: AudioCapture,
}

impl MicSource {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device exists
    pub fn new() -> Result<Self> {
        Ok(Self {
            capture: AudioCapture::new()?,
        })
    }

    /// Release the underlying device
    pub fn release(&mut self) {
        self.capture.stop();
    }
}

#[async_trait(?Send)]
impl CaptureSource for MicSource {
    async fn capture(
        &mut self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<AudioSegment> {
        self.capture.start()?;
        self.capture.clear_buffer();

        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = cancel.cancelled() => {
                tracing::debug!("capture cancelled early");
            }
        }

        let samples = self.capture.take_buffer();
        Ok(AudioSegment::from_samples(&samples, AudioFormat::speech()))
    }
}
