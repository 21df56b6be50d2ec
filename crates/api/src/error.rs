use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use speechgate_speech::{ProcessError, SpeechError};
use tracing::{error, warn};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    VoiceNotFound {
        message: String,
        available: Vec<String>,
    },
    PayloadTooLarge(String),
    Internal(String),
    ServiceUnavailable(String),
    GatewayTimeout(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, available) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::VoiceNotFound { message, available } => {
                (StatusCode::NOT_FOUND, "voice_not_found", message, Some(available))
            }
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg, None)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg, None),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", msg, None)
            }
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = error_type, %message, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            available,
        };

        (status, Json(body)).into_response()
    }
}

impl ApiError {
    /// Client-side body failure reported by an extractor.
    pub fn rejected(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(message)
        } else {
            ApiError::BadRequest(message)
        }
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::InvalidInput(msg) => ApiError::BadRequest(msg),
            SpeechError::VoiceNotFound {
                requested,
                available,
            } => {
                warn!(voice = %requested, "Unknown voice requested");
                ApiError::VoiceNotFound {
                    message: format!("Voice '{}' not found", requested),
                    available,
                }
            }
            SpeechError::Process(ProcessError::Missing { program }) => ApiError::ServiceUnavailable(
                format!("'{}' is not installed on the server", program),
            ),
            SpeechError::Process(e @ ProcessError::Timeout { .. }) => {
                ApiError::GatewayTimeout(e.to_string())
            }
            e @ SpeechError::EngineTimeout(_) => ApiError::GatewayTimeout(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
