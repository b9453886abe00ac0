//! Serving generated WAV files

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use cantus_core::audio::{AudioEncoder, AudioFormat};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Returned by both generation endpoints
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub id: Uuid,
    /// Where the browser player fetches the file
    pub url: String,
    pub path: PathBuf,
    pub sample_rate: u32,
    pub format: String,
}

impl GenerationResponse {
    pub async fn register(state: &AppState, path: PathBuf, sample_rate: u32) -> Self {
        let id = state.register_output(path.clone()).await;
        Self {
            id,
            url: format!("/api/audio/{}", id),
            path,
            sample_rate,
            format: "wav".to_string(),
        }
    }
}

pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let path = state
        .output_path(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("No audio with id {}", id)))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            state.forget_output(&id).await;
            return Err(ApiError::not_found(format!("Audio {} was removed", id)));
        }
        Err(e) => return Err(ApiError::internal(format!("Could not read audio file: {}", e))),
    };

    Ok((
        [(
            header::CONTENT_TYPE,
            AudioEncoder::content_type(AudioFormat::Wav),
        )],
        bytes,
    ))
}
