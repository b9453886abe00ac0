//! Audio output normalization: sample types, channel shaping and WAV files

mod channels;
mod encoder;
mod sample;
mod writer;

pub use channels::to_stereo;
pub use encoder::{quantize_pcm16, AudioEncoder, AudioFormat};
pub use sample::{AudioSample, ChannelLayout, RawSamples};
pub use writer::{is_wav_path, write, WaveformWriter};

/// Output rate of the speech model
pub const TTS_SAMPLE_RATE: u32 = 48000;

/// Output rate of the music model
pub const MUSIC_SAMPLE_RATE: u32 = 32000;
