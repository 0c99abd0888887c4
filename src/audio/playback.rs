//! Audio playback to speakers
//!
//! Playback is handle-based rather than blocking: the dialog session must
//! keep polling its interrupt monitor while assistant audio plays, and a
//! barge-in has to halt output immediately.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Assistant speech output as the session sees it
///
/// Exactly one utterance may be active at a time; `begin` replaces any
/// previous stream. Implemented by [`DeviceOutput`] for hardware.
pub trait SpeechOutput {
    /// Start playing synthesized audio (MP3 bytes)
    ///
    /// # Errors
    ///
    /// Returns error if decoding or stream setup fails
    fn begin(&mut self, mp3: &[u8]) -> Result<()>;

    /// Whether an utterance is still playing
    fn is_active(&self) -> bool;

    /// Halt output immediately, discarding remaining audio
    fn stop(&mut self);
}

/// Speaker-backed [`SpeechOutput`]
pub struct DeviceOutput {
    playback: AudioPlayback,
    handle: Option<PlaybackHandle>,
}

impl DeviceOutput {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device exists
    pub fn new() -> Result<Self> {
        Ok(Self {
            playback: AudioPlayback::new()?,
            handle: None,
        })
    }
}

impl SpeechOutput for DeviceOutput {
    fn begin(&mut self, mp3: &[u8]) -> Result<()> {
        // Never two live streams
        self.stop();
        self.handle = Some(self.playback.start_mp3(mp3)?);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
    }
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
}

/// A single in-flight playback stream
///
/// Dropping the handle stops output. At most one handle exists per session;
/// the dialog state machine never starts a second stream while one is live.
pub struct PlaybackHandle {
    stream: Option<Stream>,
    finished: Arc<AtomicBool>,
}

impl PlaybackHandle {
    /// Whether all samples have been written to the device
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Halt output immediately, discarding remaining audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("playback stopped");
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Start playing f32 samples, returning a stoppable handle
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built
    pub fn start(&self, samples: Vec<f32>) -> Result<PlaybackHandle> {
        let finished = Arc::new(AtomicBool::new(samples.is_empty()));
        if samples.is_empty() {
            return Ok(PlaybackHandle {
                stream: None,
                finished,
            });
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = config.channels as usize;

        let finished_cb = Arc::clone(&finished);
        let mut position = 0usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = if position < samples.len() {
                            let s = samples[position];
                            position += 1;
                            s
                        } else {
                            finished_cb.store(true, Ordering::Relaxed);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(PlaybackHandle {
            stream: Some(stream),
            finished,
        })
    }

    /// Start playing MP3 bytes (typical TTS output format)
    ///
    /// # Errors
    ///
    /// Returns error if decoding or stream setup fails
    pub fn start_mp3(&self, mp3_data: &[u8]) -> Result<PlaybackHandle> {
        let samples = decode_mp3(mp3_data)?;
        self.start(samples)
    }
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and handle stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    // Mono
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
