//! Capability detection for optional model backends

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// A generation feature that depends on an optional backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Speech,
    Music,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Speech => write!(f, "speech"),
            Capability::Music => write!(f, "music"),
        }
    }
}

/// Something that can tell which capabilities the environment offers
pub trait CapabilityProbe {
    fn probe(&self) -> Result<Capabilities>;
}

/// Availability flags, evaluated once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub speech: bool,
    pub music: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            speech: true,
            music: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Ask `probe` once; a failing probe means nothing is available.
    pub fn detect(probe: &dyn CapabilityProbe) -> Self {
        match probe.probe() {
            Ok(found) => {
                info!(
                    "Capabilities detected: speech={}, music={}",
                    found.speech, found.music
                );
                found
            }
            Err(e) => {
                warn!("Capability probe failed, disabling model features: {}", e);
                Self::none()
            }
        }
    }

    pub fn with(mut self, capability: Capability, available: bool) -> Self {
        match capability {
            Capability::Speech => self.speech = available,
            Capability::Music => self.music = available,
        }
        self
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        match capability {
            Capability::Speech => self.speech,
            Capability::Music => self.music,
        }
    }

    /// Fail with `CapabilityUnavailable` when `capability` is missing.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.is_available(capability) {
            Ok(())
        } else {
            Err(Error::CapabilityUnavailable(format!(
                "{} generation is not available in this environment",
                capability
            )))
        }
    }
}
