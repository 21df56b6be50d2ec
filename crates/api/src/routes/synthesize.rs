use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use speechgate_speech::{OutputFormat, SynthesisRequest};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SynthesizeBody {
    #[serde(default)]
    pub text: String,
    pub voice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeQuery {
    pub format: Option<String>,
}

pub async fn synthesize(
    State(state): State<AppState>,
    Query(query): Query<SynthesizeQuery>,
    body: Result<Json<SynthesizeBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<OutputFormat>()?,
        None => OutputFormat::default(),
    };
    let Json(body) = body.map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;

    let audio = state
        .speech
        .synthesize(SynthesisRequest {
            text: body.text,
            voice: body.voice,
            format,
        })
        .await?;

    let mut response = audio.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(audio.format.media_type()),
    );
    if let Ok(voice) = HeaderValue::from_str(&audio.voice) {
        headers.insert("x-voice", voice);
    }
    Ok(response)
}
