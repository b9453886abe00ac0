//! Text-to-speech endpoint

use axum::{extract::State, Json};
use cantus_core::audio::TTS_SAMPLE_RATE;
use cantus_core::SpeechRequest;
use serde::Deserialize;
use tracing::info;

use super::audio::GenerationResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// TTS request; omitted fields fall back to the configured defaults
#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
}

pub async fn tts(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    info!(
        "TTS request: {} chars, language: {:?}, speaker: {:?}",
        req.text.len(),
        req.language,
        req.speaker
    );

    let mut request = SpeechRequest::new(req.text, &state.studio.speech);
    if let Some(language) = req.language {
        request = request.with_language(language);
    }
    if let Some(model_id) = req.model_id {
        request = request.with_model_id(model_id);
    }
    if let Some(speaker) = req.speaker {
        request = request.with_speaker(speaker);
    }

    let path = state.speech.synthesize(&request).await?;
    Ok(Json(
        GenerationResponse::register(&state, path, TTS_SAMPLE_RATE).await,
    ))
}
