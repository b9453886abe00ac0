//! Error types for the Cantus audio core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The sample buffer cannot be turned into PCM audio.
    #[error("Audio encoding error: {0}")]
    EncodingError(String),

    /// Temp file allocation or the file write itself failed.
    #[error("Filesystem error: {0}")]
    FilesystemError(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Capability not available: {0}")]
    CapabilityUnavailable(String),

    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => Error::FilesystemError(io),
            other => Error::EncodingError(other.to_string()),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(e: tempfile::PersistError) -> Self {
        Error::FilesystemError(e.error)
    }
}

impl Error {
    /// True when the failure came from the audio buffer rather than the disk.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Error::EncodingError(_))
    }

    pub fn is_filesystem(&self) -> bool {
        matches!(self, Error::FilesystemError(_))
    }
}
