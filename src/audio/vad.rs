//! Voice activity classification
//!
//! A pragmatic energy/zero-crossing classifier, not a statistical model.
//! Amplitudes are expressed on an 8-bit (0-255) scale so the configured
//! detection threshold range (10-80) maps directly onto analyser readings.

use crate::audio::AudioSegment;

/// Frame length for energy-variance computation (~25ms of speech)
const VARIANCE_FRAME_MS: u32 = 25;

/// Composite score required to accept a borderline segment as speech
const SPEECH_SCORE: u32 = 3;

/// Tunable inputs to [`classify`]
///
/// The score bands are empirically tuned starting defaults, not ground
/// truth; both knobs are configuration, never baked constants.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Average-amplitude threshold on the 0-255 scale (valid range 10-80)
    pub threshold: f32,
    /// Minimum frame-energy variance treated as speech-like modulation
    pub energy_variance_epsilon: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 30.0,
            energy_variance_epsilon: 0.5,
        }
    }
}

/// Derived per-segment features, computed and discarded per call
#[derive(Debug, Clone, Copy)]
pub struct VoiceFeatures {
    /// Mean absolute amplitude (0-255 scale)
    pub average_amplitude: f32,
    /// Peak absolute amplitude (0-255 scale)
    pub peak_amplitude: f32,
    /// Sign changes per sample
    pub zero_crossing_rate: f32,
    /// Variance of per-frame energy over ~25ms frames
    pub frame_energy_variance: f32,
}

/// Decide whether a segment contains speech
///
/// Fast-rejects below the threshold, fast-accepts above 3x the threshold,
/// and scores borderline segments on dynamic range, zero-crossing rate,
/// frame-energy variance, and peak amplitude. A segment that cannot be
/// decoded is treated as speech: real speech must never be silently
/// dropped.
#[must_use]
pub fn classify(segment: &AudioSegment, config: &VadConfig) -> bool {
    let Ok(samples) = segment.decode_samples() else {
        tracing::warn!("segment decode failed, classifying as speech");
        return true;
    };

    if samples.is_empty() {
        return false;
    }

    let features = extract_features(&samples, segment.format().sample_rate);

    if features.average_amplitude < config.threshold {
        return false;
    }
    if features.average_amplitude > 3.0 * config.threshold {
        return true;
    }

    let mut score = 0u32;

    let dynamic_range = features.peak_amplitude / features.average_amplitude.max(f32::EPSILON);
    if dynamic_range > 2.0 && dynamic_range < 20.0 {
        score += 2;
    } else if dynamic_range > 1.5 {
        score += 1;
    }

    if features.zero_crossing_rate > 0.01 && features.zero_crossing_rate < 0.3 {
        score += 2;
    } else if features.zero_crossing_rate > 0.005 && features.zero_crossing_rate < 0.5 {
        score += 1;
    }

    if features.frame_energy_variance > config.energy_variance_epsilon {
        score += 1;
    }

    if features.peak_amplitude > 2.0 * config.threshold {
        score += 1;
    }

    tracing::trace!(
        avg = features.average_amplitude,
        peak = features.peak_amplitude,
        zcr = features.zero_crossing_rate,
        variance = features.frame_energy_variance,
        score,
        "borderline segment scored"
    );

    score >= SPEECH_SCORE
}

/// Compute classification features from decoded samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn extract_features(samples: &[f32], sample_rate: u32) -> VoiceFeatures {
    if samples.is_empty() {
        return VoiceFeatures {
            average_amplitude: 0.0,
            peak_amplitude: 0.0,
            zero_crossing_rate: 0.0,
            frame_energy_variance: 0.0,
        };
    }

    let mut sum = 0.0f32;
    let mut peak = 0.0f32;
    let mut crossings = 0usize;

    for (i, &sample) in samples.iter().enumerate() {
        let amp = sample.abs();
        sum += amp;
        peak = peak.max(amp);
        if i > 0 && (sample >= 0.0) != (samples[i - 1] >= 0.0) {
            crossings += 1;
        }
    }

    let frame_len = (sample_rate * VARIANCE_FRAME_MS / 1000).max(1) as usize;
    let frame_energies: Vec<f32> = samples
        .chunks(frame_len)
        .map(|frame| {
            frame.iter().map(|s| (s.abs() * 255.0).powi(2)).sum::<f32>() / frame.len() as f32
        })
        .collect();
    let mean_energy = frame_energies.iter().sum::<f32>() / frame_energies.len() as f32;
    let variance = frame_energies
        .iter()
        .map(|e| (e - mean_energy).powi(2))
        .sum::<f32>()
        / frame_energies.len() as f32;

    VoiceFeatures {
        average_amplitude: sum / samples.len() as f32 * 255.0,
        peak_amplitude: peak * 255.0,
        zero_crossing_rate: crossings as f32 / samples.len() as f32,
        frame_energy_variance: variance,
    }
}
