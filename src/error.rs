use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

const GENERIC_DETAIL: &str = "An unexpected error occurred";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Could not understand the audio: {0}")]
    UnintelligibleAudio(String),

    #[error("Speech recognition service failed: {0}")]
    SpeechServiceUnavailable(String),

    #[error("Chat completion failed: {0}")]
    CompletionService(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Audio file '{0}' not found")]
    AudioNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        Self::Persistence(format!("connection pool: {e}"))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::UnintelligibleAudio(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::AudioNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::UnintelligibleAudio(_) => "UNINTELLIGIBLE_AUDIO",
            Self::SpeechServiceUnavailable(_) => "SPEECH_SERVICE_UNAVAILABLE",
            Self::CompletionService(_) => "COMPLETION_SERVICE_ERROR",
            Self::Synthesis(_) => "SYNTHESIS_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::AudioNotFound(_) => "AUDIO_NOT_FOUND",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Server-side causes stay in the log; clients get the kind only.
        let detail = if status.is_server_error() {
            tracing::error!("Request failed: {} - {}", code, self);
            GENERIC_DETAIL.to_string()
        } else {
            tracing::warn!("Request rejected: {} - {}", code, self);
            match &self {
                Self::InvalidInput(msg) => msg.clone(),
                Self::UnintelligibleAudio(_) => "Could not understand the audio".to_string(),
                other => other.to_string(),
            }
        };

        (
            status,
            Json(ErrorResponse {
                detail,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
