//! Text-to-music endpoint

use axum::{extract::State, Json};
use cantus_core::audio::MUSIC_SAMPLE_RATE;
use cantus_core::model::{Device, ModelSize};
use cantus_core::MusicRequest;
use serde::Deserialize;
use tracing::info;

use super::audio::GenerationResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Music request; omitted fields fall back to the configured defaults
#[derive(Debug, Deserialize)]
pub struct MusicGenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub model_size: Option<ModelSize>,
    #[serde(default)]
    pub device: Option<Device>,
}

pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<MusicGenerationRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    info!(
        "Music request: {} chars, duration: {:?}, model: {:?}",
        req.prompt.len(),
        req.duration,
        req.model_size
    );

    let mut request = MusicRequest::new(req.prompt, &state.studio.music);
    if let Some(duration) = req.duration {
        request = request.with_duration(duration);
    }
    if let Some(model_size) = req.model_size {
        request = request.with_model_size(model_size);
    }
    if let Some(device) = req.device {
        request = request.with_device(device);
    }

    let path = state.music.generate(&request).await?;
    Ok(Json(
        GenerationResponse::register(&state, path, MUSIC_SAMPLE_RATE).await,
    ))
}
