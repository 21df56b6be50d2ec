use axum::{Json, extract::State};
use serde::Serialize;
use speechgate_speech::VoicePolicy;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub policy: VoicePolicy,
    pub default: String,
    pub voices: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> Json<VoicesResponse> {
    let catalog = state.speech.voices();
    Json(VoicesResponse {
        policy: catalog.policy(),
        default: catalog.default_voice().to_string(),
        voices: catalog.available(),
    })
}
