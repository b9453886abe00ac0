//! Layered configuration: defaults, optional file, `CANTUS_*` environment

use cantus_core::{ServerConfig, StudioConfig};
use serde::Deserialize;
use std::path::Path;

/// Everything the server reads at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub studio: StudioConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Settings {
    /// Load settings from `path` (or `cantus.toml` when present) and the
    /// environment, e.g. `CANTUS_SERVER__PORT=9000`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("cantus").required(false),
        };
        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("CANTUS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.studio.validate()?;
        Ok(settings)
    }
}
