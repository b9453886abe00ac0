//! Capability report for the front-end

use axum::{extract::State, Json};
use cantus_core::audio::{MUSIC_SAMPLE_RATE, TTS_SAMPLE_RATE};
use cantus_core::model::{MAX_DURATION_SECS, MIN_DURATION_SECS};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub speech: bool,
    pub music: bool,
    pub tts_sample_rate: u32,
    pub music_sample_rate: u32,
    pub music_duration_range: [u32; 2],
    /// Generated files currently served by id
    pub outputs: usize,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        speech: state.capabilities.speech,
        music: state.capabilities.music,
        tts_sample_rate: TTS_SAMPLE_RATE,
        music_sample_rate: MUSIC_SAMPLE_RATE,
        music_duration_range: [MIN_DURATION_SECS, MAX_DURATION_SECS],
        outputs: state.output_count().await,
    })
}
