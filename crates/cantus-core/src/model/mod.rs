//! Model adapters for speech synthesis and music generation
//!
//! Adapters own a [`ModelCache`] of loaded models, run inference on the
//! blocking pool and hand the raw output to the [`WaveformWriter`].
//!
//! [`WaveformWriter`]: crate::audio::WaveformWriter

mod cache;
mod capabilities;
mod music;
mod speech;

pub use cache::ModelCache;
pub use capabilities::{Capabilities, Capability, CapabilityProbe};
pub use music::{
    Device, ModelSize, MusicGenerator, MusicKey, MusicLoader, MusicModel, MusicRequest,
    MAX_DURATION_SECS, MIN_DURATION_SECS,
};
pub use speech::{SpeechLoader, SpeechModel, SpeechRequest, SpeechSynthesizer, VoiceKey};

use crate::error::{Error, Result};

/// Run a blocking model or file operation off the async executor.
pub(crate) async fn run_blocking<T, F>(what: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::InferenceError(format!("{} task failed: {}", what, e)))?
}
