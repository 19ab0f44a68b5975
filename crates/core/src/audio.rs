//! Decoding of text-to-speech payloads.
//!
//! The speech model answers with base64-encoded raw PCM: 16-bit signed
//! little-endian samples, 24 kHz, mono. This module turns that payload into
//! normalized float samples and, on demand, into a WAV file the browser can play.

use crate::error::{Result, TutorError};
use base64::Engine;
use std::io::Cursor;
use std::time::Duration;

pub const PCM_SAMPLE_RATE: u32 = 24000;
pub const PCM_CHANNELS: u16 = 1;

/// Raw PCM returned by a pronunciation request.
///
/// Lives as long as the lookup result that owns it; it is decoded each time
/// it is played rather than cached in decoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PronunciationAudio {
    pcm: Vec<u8>,
}

impl PronunciationAudio {
    /// Decodes the base64 payload into raw PCM bytes.
    pub fn from_base64(payload: &str) -> Result<Self> {
        let pcm = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| TutorError::InvalidAudio(e.to_string()))?;
        Ok(Self { pcm })
    }

    pub fn from_pcm(pcm: Vec<u8>) -> Self {
        Self { pcm }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pcm
    }

    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Decodes using the speech model's fixed format.
    pub fn decode(&self) -> AudioBuffer {
        decode_pcm16(&self.pcm, PCM_CHANNELS, PCM_SAMPLE_RATE)
    }
}

/// De-interleaved float samples in `[-1.0, 1.0]`, one buffer per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Number of samples per channel. Shorter channels are treated as
    /// padded with silence.
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.frames() as u64 * 1_000_000_000 / u64::from(self.sample_rate))
    }

    /// Encodes the buffer as a 16-bit PCM WAV file.
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.channel_count().max(1),
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
            .map_err(|e| TutorError::InvalidAudio(e.to_string()))?;
        for frame in 0..self.frames() {
            for channel in &self.channels {
                writer
                    .write_sample(to_i16(channel.get(frame).copied().unwrap_or(0.0)))
                    .map_err(|e| TutorError::InvalidAudio(e.to_string()))?;
            }
        }
        writer
            .finalize()
            .map_err(|e| TutorError::InvalidAudio(e.to_string()))?;
        Ok(bytes)
    }
}

/// Interprets `bytes` as interleaved 16-bit little-endian PCM.
///
/// Trailing bytes that do not make up a whole frame are dropped.
pub fn decode_pcm16(bytes: &[u8], channel_count: u16, sample_rate: u32) -> AudioBuffer {
    let channel_count = usize::from(channel_count.max(1));
    let frame_len = 2 * channel_count;
    let frames = bytes.len() / frame_len;

    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in bytes.chunks_exact(frame_len) {
        for (channel, sample) in channels.iter_mut().zip(frame.chunks_exact(2)) {
            let v = i16::from_le_bytes([sample[0], sample[1]]);
            channel.push(v as f32 / 32768.0);
        }
    }

    AudioBuffer {
        sample_rate,
        channels,
    }
}

/// Encodes mono float samples as base64 16-bit PCM, the speech model's wire format.
pub fn encode_pcm16_base64(samples: &[f32]) -> String {
    let pcm16: Vec<u8> = samples
        .iter()
        .flat_map(|&sample| to_i16(sample).to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16)
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
