//! Captured audio segments
//!
//! A segment is immutable once captured: interleaved 16-bit little-endian
//! PCM plus its format descriptor. Ownership moves when a segment is handed
//! to a buffer or a recognition call.

use crate::{Error, Result};

/// Sample rate for capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Sample encoding of a segment's byte buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Signed 16-bit little-endian PCM
    Pcm16Le,
}

/// Format descriptor for an [`AudioSegment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Byte-level sample encoding
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    /// Default capture format: 16kHz mono PCM16
    #[must_use]
    pub const fn speech() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            encoding: SampleEncoding::Pcm16Le,
        }
    }
}

/// One captured chunk of audio
#[derive(Debug, Clone)]
pub struct AudioSegment {
    bytes: Vec<u8>,
    format: AudioFormat,
}

impl AudioSegment {
    /// Build a segment from f32 samples in [-1.0, 1.0]
    #[must_use]
    pub fn from_samples(samples: &[f32], format: AudioFormat) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let s = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        Self { bytes, format }
    }

    /// Wrap raw PCM bytes in a segment without validation
    ///
    /// Malformed input surfaces later as a [`decode_samples`](Self::decode_samples)
    /// error, which the classifier treats as speech (fail open).
    #[must_use]
    pub const fn from_raw(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self { bytes, format }
    }

    /// Decode to f32 samples in [-1.0, 1.0]
    ///
    /// # Errors
    ///
    /// Returns error if the byte buffer is not a whole number of PCM16 frames
    pub fn decode_samples(&self) -> Result<Vec<f32>> {
        if self.bytes.len() % 2 != 0 {
            return Err(Error::Audio(format!(
                "segment has partial PCM16 frame ({} bytes)",
                self.bytes.len()
            )));
        }

        Ok(self
            .bytes
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
            .collect())
    }

    /// Format descriptor
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Raw encoded bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the segment holds no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Playback duration of the segment
    #[must_use]
    pub fn duration(&self) -> std::time::Duration {
        let frames = self.bytes.len() as u64 / 2 / u64::from(self.format.channels);
        std::time::Duration::from_millis(frames * 1000 / u64::from(self.format.sample_rate))
    }

    /// Concatenate segments in order into one segment
    ///
    /// Returns `None` for an empty input. All segments are assumed to share
    /// the first segment's format; sessions only ever mix segments from one
    /// capture source.
    #[must_use]
    pub fn concat(segments: &[Self]) -> Option<Self> {
        let first = segments.first()?;
        let mut bytes = Vec::with_capacity(segments.iter().map(|s| s.bytes.len()).sum());
        for segment in segments {
            bytes.extend_from_slice(&segment.bytes);
        }
        Some(Self {
            bytes,
            format: first.format,
        })
    }

    /// Encode as WAV bytes for STT upload
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| Error::Audio(e.to_string()))?;

            for chunk in self.bytes.chunks_exact(2) {
                writer
                    .write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
                    .map_err(|e| Error::Audio(e.to_string()))?;
            }

            writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_roundtrip() {
        let samples = vec![0.0, 0.5, -0.5, 0.25];
        let segment = AudioSegment::from_samples(&samples, AudioFormat::speech());
        let decoded = segment.decode_samples().unwrap();

        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(&decoded) {
            assert!((a - b).abs() < 0.001);
        }
    }

    #[test]
    fn test_partial_frame_fails_decode() {
        let segment = AudioSegment::from_raw(vec![0x01, 0x02, 0x03], AudioFormat::speech());
        assert!(segment.decode_samples().is_err());
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = AudioSegment::from_samples(&[0.1, 0.2], AudioFormat::speech());
        let b = AudioSegment::from_samples(&[0.3], AudioFormat::speech());
        let joined = AudioSegment::concat(&[a, b]).unwrap();

        let decoded = joined.decode_samples().unwrap();
        assert_eq!(decoded.len(), 3);
        assert!((decoded[0] - 0.1).abs() < 0.001);
        assert!((decoded[2] - 0.3).abs() < 0.001);

        assert!(AudioSegment::concat(&[]).is_none());
    }

    #[test]
    fn test_duration() {
        let samples = vec![0.0; SAMPLE_RATE as usize / 2];
        let segment = AudioSegment::from_samples(&samples, AudioFormat::speech());
        assert_eq!(segment.duration(), std::time::Duration::from_millis(500));
    }

    #[test]
    fn test_wav_header() {
        let segment = AudioSegment::from_samples(&[0.5; 160], AudioFormat::speech());
        let wav = segment.to_wav().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }
}
