//! Configuration types for Cantus

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::{Device, ModelSize, MAX_DURATION_SECS, MIN_DURATION_SECS};

/// Main studio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Directory for generated WAV files (OS temp dir when unset)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// File name prefix for generated WAV files
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Python interpreter used by the model bridge
    #[serde(default = "default_python_cmd")]
    pub python_cmd: String,

    /// Helper script the bridge runs
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,

    /// Download cache handed to the model hub (TORCH_HOME)
    #[serde(default = "default_hub_dir")]
    pub hub_dir: PathBuf,

    #[serde(default)]
    pub speech: SpeechDefaults,

    #[serde(default)]
    pub music: MusicDefaults,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            file_prefix: default_file_prefix(),
            python_cmd: default_python_cmd(),
            script_path: default_script_path(),
            hub_dir: default_hub_dir(),
            speech: SpeechDefaults::default(),
            music: MusicDefaults::default(),
        }
    }
}

impl StudioConfig {
    /// Reject values that would only fail later, at generation time.
    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.contains(['/', '\\']) {
            return Err(Error::ConfigError(format!(
                "file_prefix {:?} must not contain a path separator",
                self.file_prefix
            )));
        }
        if self.python_cmd.trim().is_empty() {
            return Err(Error::ConfigError("python_cmd is empty".to_string()));
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.music.duration_secs) {
            return Err(Error::ConfigError(format!(
                "music.duration_secs must be within {}..={} seconds",
                MIN_DURATION_SECS, MAX_DURATION_SECS
            )));
        }
        Ok(())
    }
}

/// Defaults for speech requests that leave fields out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechDefaults {
    #[serde(default = "default_language")]
    pub language: String,

    /// Model package loaded per language
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Voice used within the loaded model
    #[serde(default = "default_speaker")]
    pub speaker: String,
}

impl Default for SpeechDefaults {
    fn default() -> Self {
        Self {
            language: default_language(),
            model_id: default_model_id(),
            speaker: default_speaker(),
        }
    }
}

/// Defaults for music requests that leave fields out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicDefaults {
    #[serde(default)]
    pub model_size: ModelSize,

    #[serde(default)]
    pub device: Device,

    #[serde(default = "default_duration_secs")]
    pub duration_secs: u32,
}

impl Default for MusicDefaults {
    fn default() -> Self {
        Self {
            model_size: ModelSize::default(),
            device: Device::default(),
            duration_secs: default_duration_secs(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    /// Generated files the server keeps addressable by id
    #[serde(default = "default_max_outputs")]
    pub max_outputs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_cors_enabled(),
            max_outputs: default_max_outputs(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_max_outputs() -> usize {
    4096
}

fn default_file_prefix() -> String {
    "cantus-".to_string()
}

fn default_python_cmd() -> String {
    "python3".to_string()
}

fn default_script_path() -> PathBuf {
    std::env::current_dir()
        .map(|p| p.join("scripts/cantus_models.py"))
        .unwrap_or_else(|_| PathBuf::from("scripts/cantus_models.py"))
}

fn default_hub_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("cantus")
        .join("hub")
}

fn default_language() -> String {
    "en".to_string()
}

fn default_model_id() -> String {
    "v3_en".to_string()
}

fn default_speaker() -> String {
    "en_0".to_string()
}

fn default_duration_secs() -> u32 {
    8
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7860
}

fn default_cors_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: StudioConfig =
            serde_json::from_str(r#"{ "music": { "model_size": "medium" } }"#).unwrap();
        assert_eq!(config.file_prefix, "cantus-");
        assert_eq!(config.speech.model_id, "v3_en");
        assert_eq!(config.speech.speaker, "en_0");
        assert_eq!(config.music.model_size, ModelSize::Medium);
        assert_eq!(config.music.device, Device::Cuda);
        assert_eq!(config.music.duration_secs, 8);
        assert!(config.output_dir.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn prefix_with_separator_is_rejected() {
        let config = StudioConfig {
            file_prefix: "../escape".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn default_duration_range_is_enforced() {
        let mut config = StudioConfig::default();
        config.music.duration_secs = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn server_bind_addr() {
        assert_eq!(ServerConfig::default().bind_addr(), "0.0.0.0:7860");
        assert_eq!(ServerConfig::default().max_outputs, 4096);
    }
}
