//! Text-to-music adapter

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use super::cache::ModelCache;
use super::capabilities::{Capabilities, Capability};
use super::run_blocking;
use crate::audio::{ChannelLayout, RawSamples, WaveformWriter, MUSIC_SAMPLE_RATE};
use crate::config::MusicDefaults;
use crate::error::{Error, Result};

/// Shortest clip a request may ask for
pub const MIN_DURATION_SECS: u32 = 2;

/// Longest clip a request may ask for
pub const MAX_DURATION_SECS: u32 = 30;

/// Pretrained music model checkpoint size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            other => Err(Error::InvalidInput(format!("unknown model size: {}", other))),
        }
    }
}

/// Compute device the music model runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cuda" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            other => Err(Error::InvalidInput(format!("unknown device: {}", other))),
        }
    }
}

/// Identifies one loaded music model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicKey {
    pub model_size: ModelSize,
    pub device: Device,
}

/// A loaded music generation model
pub trait MusicModel: Send + Sync {
    /// Generate a clip for `prompt`.
    ///
    /// The output may be mono `(frames,)`, channels-first `(channels, frames)`
    /// or a batch `(batch, channels, frames)`.
    fn generate(&self, prompt: &str, duration_secs: u32) -> Result<RawSamples>;
}

/// Loads music models; called once per [`MusicKey`]
pub trait MusicLoader: Send + Sync {
    fn load(&self, key: &MusicKey) -> Result<Arc<dyn MusicModel>>;
}

#[derive(Debug, Clone)]
pub struct MusicRequest {
    pub prompt: String,
    pub duration_secs: u32,
    pub model_size: ModelSize,
    pub device: Device,
}

impl MusicRequest {
    pub fn new(prompt: impl Into<String>, defaults: &MusicDefaults) -> Self {
        Self {
            prompt: prompt.into(),
            duration_secs: defaults.duration_secs,
            model_size: defaults.model_size,
            device: defaults.device,
        }
    }

    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn with_model_size(mut self, model_size: ModelSize) -> Self {
        self.model_size = model_size;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn key(&self) -> MusicKey {
        MusicKey {
            model_size: self.model_size,
            device: self.device,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt is empty".to_string()));
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Err(Error::InvalidInput(format!(
                "duration must be between {} and {} seconds, got {}",
                MIN_DURATION_SECS, MAX_DURATION_SECS, self.duration_secs
            )));
        }
        Ok(())
    }
}

/// Keep the first clip of a batched model output.
fn select_clip(samples: RawSamples) -> Result<RawSamples> {
    match samples.ndim() {
        3 => samples
            .take_first()
            .ok_or_else(|| Error::EncodingError("music model returned an empty batch".to_string())),
        _ => Ok(samples),
    }
}

/// Turns prompts into 32 kHz WAV files
pub struct MusicGenerator {
    loader: Arc<dyn MusicLoader>,
    models: ModelCache<MusicKey, dyn MusicModel>,
    writer: WaveformWriter,
    capabilities: Capabilities,
}

impl MusicGenerator {
    pub fn new(
        loader: Arc<dyn MusicLoader>,
        writer: WaveformWriter,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            loader,
            models: ModelCache::new(),
            writer,
            capabilities,
        }
    }

    pub fn is_available(&self) -> bool {
        self.capabilities.is_available(Capability::Music)
    }

    pub fn models(&self) -> &ModelCache<MusicKey, dyn MusicModel> {
        &self.models
    }

    /// Generate a clip for `request` and return the path of the WAV file.
    pub async fn generate(&self, request: &MusicRequest) -> Result<PathBuf> {
        self.capabilities.require(Capability::Music)?;
        request.validate()?;

        let key = request.key();
        let model = self
            .models
            .get_or_create(key, || {
                let loader = self.loader.clone();
                async move {
                    info!("Loading music model {} on {}", key.model_size, key.device);
                    run_blocking("music model load", move || loader.load(&key))
                        .await
                        .map_err(|e| match e {
                            Error::ModelLoadError(_) => e,
                            other => Error::ModelLoadError(other.to_string()),
                        })
                }
            })
            .await?;

        let prompt = request.prompt.clone();
        let duration = request.duration_secs;
        let samples =
            run_blocking("music generation", move || model.generate(&prompt, duration)).await?;

        debug!(
            "Music model returned {} buffer of shape {:?}",
            samples.dtype(),
            samples.shape()
        );
        let clip = select_clip(samples)?;

        let writer = self.writer.clone();
        run_blocking("music write", move || {
            writer.write_raw(&clip, MUSIC_SAMPLE_RATE, ChannelLayout::ChannelsFirst)
        })
        .await
    }
}
