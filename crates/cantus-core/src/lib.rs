//! Cantus Core - audio output normalization for speech and music models
//!
//! Pretrained models hand back raw sample buffers of varying element type,
//! rank and channel layout. This crate turns those buffers into playable
//! 16-bit PCM WAV files and wraps the models behind small adapters.
//!
//! # Architecture
//!
//! - [`audio`]: waveform writer, PCM16 encoder and channel shape normalizer
//! - [`model`]: model cache, capability flags, speech and music adapters
//! - [`inference`]: the Python bridge that hosts the pretrained models
//!
//! # Example
//!
//! ```no_run
//! use cantus_core::audio::{to_stereo, WaveformWriter, TTS_SAMPLE_RATE};
//! use ndarray::arr1;
//!
//! let mono = arr1(&[0.0f32, 0.5, -0.5, 1.0]);
//! let path = WaveformWriter::new().write(mono.view(), TTS_SAMPLE_RATE)?;
//! let stereo = to_stereo(mono.into_dyn());
//! assert_eq!(stereo.shape(), &[4, 2]);
//! # Ok::<(), cantus_core::Error>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod inference;
pub mod model;

pub use audio::{to_stereo, ChannelLayout, RawSamples, WaveformWriter};
pub use config::{ServerConfig, StudioConfig};
pub use error::{Error, Result};
pub use inference::PythonBridge;
pub use model::{
    Capabilities, Capability, ModelCache, MusicGenerator, MusicRequest, SpeechRequest,
    SpeechSynthesizer,
};
