//! Speech-to-text over an OpenAI-compatible `/audio/transcriptions` API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{validate_wav, Transcriber};
use crate::error::AppError;

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct WhisperTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("STT client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/audio/transcriptions", base_url.trim_end_matches('/')),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, AppError> {
        let audio = tokio::fs::read(audio_path).await?;
        let spec = validate_wav(&audio)?;
        tracing::debug!(
            audio_bytes = audio.len(),
            sample_rate = spec.sample_rate,
            "starting transcription"
        );

        let file = reqwest::multipart::Part::bytes(audio)
            .file_name("user_audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| AppError::SpeechServiceUnavailable(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            AppError::SpeechServiceUnavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(classify_failure(status, body));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AppError::SpeechServiceUnavailable(format!("malformed response: {e}")))?;

        let text = result.text.trim();
        if text.is_empty() {
            return Err(AppError::UnintelligibleAudio("empty transcript".into()));
        }

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text.to_string())
    }
}

/// The service rejecting the clip itself is the caller's problem; anything
/// else (auth, quota, outages) is ours.
fn classify_failure(status: StatusCode, body: String) -> AppError {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => AppError::UnintelligibleAudio(body),
        _ => AppError::SpeechServiceUnavailable(format!("{status}: {body}")),
    }
}
