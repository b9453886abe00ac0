//! HTTP routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod audio;
mod music;
mod speech;
mod status;

/// Build the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status::status))
        .route("/api/tts", post(speech::tts))
        .route("/api/music", post(music::generate))
        .route("/api/audio/:id", get(audio::fetch))
        .with_state(state)
}
