use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use speechgate_speech::{AudioBuffer, TranscriptionResult};

use crate::{error::ApiError, state::AppState};

struct Upload {
    filename: Option<String>,
    bytes: Vec<u8>,
}

/// Transcribe an uploaded audio file.
/// Fields: `audio` (or `file`); otherwise the first field carrying a filename.
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptionResult>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        ApiError::rejected(e.status(), format!("Expected multipart upload: {}", e.body_text()))
    })?;

    let mut named: Option<Upload> = None;
    let mut fallback: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejected(e.status(), format!("Multipart error: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(str::to_string);
        let preferred = name == "audio" || name == "file";
        if !preferred && (filename.is_none() || fallback.is_some()) {
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| {
                ApiError::rejected(e.status(), format!("Failed to read file: {}", e.body_text()))
            })?;
        let upload = Upload {
            filename,
            bytes: bytes.to_vec(),
        };

        match name.as_str() {
            "audio" => {
                named = Some(upload);
                break;
            }
            "file" if named.is_none() => named = Some(upload),
            "file" => {}
            _ => fallback = Some(upload),
        }
    }

    let upload = named
        .or(fallback)
        .ok_or_else(|| ApiError::BadRequest("Missing audio file field".to_string()))?;

    let result = state
        .speech
        .transcribe(AudioBuffer::from_upload(upload.bytes, upload.filename))
        .await?;
    Ok(Json(result))
}
