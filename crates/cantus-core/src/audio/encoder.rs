//! PCM16 quantization and WAV encoding

use hound::{WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};
use tracing::debug;

use crate::error::{Error, Result};

/// Supported audio output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// WAV container, 16-bit integer PCM
    Wav,
    /// Raw PCM samples (f32)
    RawF32,
    /// Raw PCM samples (i16)
    RawI16,
}

/// Bytes per quantized sample
const PCM16_BYTES: u64 = 2;

/// Quantize one sample to 16-bit PCM.
///
/// Values outside [-1.0, 1.0] are clipped to the representable range.
#[inline]
pub fn quantize_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Audio encoder for interleaved f32 samples
#[derive(Debug, Clone, Copy)]
pub struct AudioEncoder {
    sample_rate: u32,
    channels: u16,
}

impl AudioEncoder {
    /// Create an encoder, rejecting a zero sample rate or channel count.
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::EncodingError(
                "sample rate must be a positive integer".to_string(),
            ));
        }
        if channels == 0 {
            return Err(Error::EncodingError(
                "buffer has no channels".to_string(),
            ));
        }
        // The header stores the frame size as u16 and the byte rate as u32
        let block_align = channels as u64 * PCM16_BYTES;
        if block_align > u16::MAX as u64 || block_align * sample_rate as u64 > u32::MAX as u64 {
            return Err(Error::EncodingError(format!(
                "{} channels at {} Hz do not fit a WAV header",
                channels, sample_rate
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// WAV header parameters used for every file this encoder writes.
    pub fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Check an interleaved buffer before anything is written.
    pub fn validate(&self, samples: &[f32]) -> Result<()> {
        if samples.len() % self.channels as usize != 0 {
            return Err(Error::EncodingError(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                self.channels
            )));
        }
        if let Some(idx) = samples.iter().position(|s| s.is_nan()) {
            return Err(Error::EncodingError(format!(
                "sample {} is not a number",
                idx
            )));
        }
        Ok(())
    }

    /// Encode samples to the specified format
    pub fn encode(&self, samples: &[f32], format: AudioFormat) -> Result<Vec<u8>> {
        self.validate(samples)?;
        match format {
            AudioFormat::Wav => self.encode_wav(samples),
            AudioFormat::RawF32 => Ok(self.encode_raw_f32(samples)),
            AudioFormat::RawI16 => Ok(self.encode_raw_i16(samples)),
        }
    }

    /// Stream interleaved frames into a WAV container on any seekable sink.
    ///
    /// The frame iterator yields one interleaved sample at a time, so callers
    /// can feed strided array views without collecting them first.
    pub fn write_wav<W, I>(&self, sink: W, samples: I) -> Result<usize>
    where
        W: Write + Seek,
        I: IntoIterator<Item = f32>,
    {
        let mut writer = WavWriter::new(sink, self.wav_spec())?;
        let mut written = 0usize;
        for sample in samples {
            if sample.is_nan() {
                return Err(Error::EncodingError(format!(
                    "sample {} is not a number",
                    written
                )));
            }
            writer.write_sample(quantize_pcm16(sample))?;
            written += 1;
        }
        writer.finalize()?;
        Ok(written)
    }

    fn encode_wav(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_wav(&mut buffer, samples.iter().copied())?;

        debug!(
            "Encoded {} samples to WAV ({} bytes)",
            samples.len(),
            buffer.get_ref().len()
        );
        Ok(buffer.into_inner())
    }

    fn encode_raw_f32(&self, samples: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for &sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    fn encode_raw_i16(&self, samples: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&quantize_pcm16(sample).to_le_bytes());
        }
        bytes
    }

    /// Get content type for format
    pub fn content_type(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::RawF32 => "application/octet-stream",
            AudioFormat::RawI16 => "application/octet-stream",
        }
    }
}
