use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{HealthResponse, ProcessResponse, RootResponse};
use crate::api::routes::AppState;
use crate::assistant::UserInput;
use crate::error::AppError;

/// Urlencoded forms can only carry text.
#[derive(Deserialize)]
struct TextForm {
    text: Option<String>,
}

pub async fn process_voice(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ProcessResponse>, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let input = if content_type.starts_with("multipart/form-data") {
        let form = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| bad_form(rejection.status(), rejection.body_text()))?;
        read_multipart(form).await?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<TextForm>::from_request(request, &state)
            .await
            .map_err(|rejection| bad_form(rejection.status(), rejection.body_text()))?;
        UserInput {
            text: form.text,
            audio: None,
        }
    } else {
        // Neither form type carries a field we know.
        tracing::debug!(content_type = %content_type, "request without form data");
        UserInput::default()
    };

    let exchange = state.assistant.handle(input).await?;
    Ok(Json(exchange.into()))
}

async fn read_multipart(mut form: Multipart) -> Result<UserInput, AppError> {
    let field_err =
        |e: axum::extract::multipart::MultipartError| bad_form(e.status(), e.body_text());

    let mut input = UserInput::default();
    while let Some(field) = form.next_field().await.map_err(field_err)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => input.text = Some(field.text().await.map_err(field_err)?),
            "audio_file" => input.audio = Some(field.bytes().await.map_err(field_err)?),
            other => tracing::debug!(field = %other, "ignoring unknown form field"),
        }
    }
    Ok(input)
}

fn bad_form(status: StatusCode, detail: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(detail)
    } else {
        AppError::InvalidInput(format!("Malformed form data: {detail}"))
    }
}

pub async fn get_audio(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let wav = state.assistant.store().read_audio(&filename).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Hello, World!",
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
