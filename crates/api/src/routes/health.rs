use axum::{Json, extract::State};
use serde::Serialize;
use speechgate_speech::EngineStatus;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub profile: String,
    pub engines: Vec<EngineStatus>,
}

/// Liveness plus engine load states. Never triggers a load.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        profile: state.settings.backend.profile.clone(),
        engines: state.speech.registry().status(),
    })
}
