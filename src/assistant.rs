//! Request orchestration: recognize, resolve, speak, record.

use std::sync::Arc;

use bytes::Bytes;

use crate::chat::ChatCompletion;
use crate::db::{InteractionLog, NewInteraction};
use crate::error::AppError;
use crate::intents::{IntentResolver, MatchResult};
use crate::speech::{Synthesizer, Transcriber};
use crate::storage::AudioStore;

pub const MAX_TEXT_CHARS: usize = 10_000;

/// What the caller sent. Typed text wins over audio when both are present.
#[derive(Debug, Default)]
pub struct UserInput {
    pub text: Option<String>,
    pub audio: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub text_input: String,
    pub text_response: String,
    pub audio_response: String,
}

pub struct Assistant {
    intents: IntentResolver,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    chat: Arc<dyn ChatCompletion>,
    store: AudioStore,
    log: InteractionLog,
}

impl Assistant {
    pub fn new(
        intents: IntentResolver,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        chat: Arc<dyn ChatCompletion>,
        store: AudioStore,
        log: InteractionLog,
    ) -> Self {
        Self {
            intents,
            transcriber,
            synthesizer,
            chat,
            store,
            log,
        }
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    pub async fn handle(&self, input: UserInput) -> Result<Exchange, AppError> {
        let typed = input
            .text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let (text, voice_path) = match (typed, input.audio.filter(|a| !a.is_empty())) {
            (Some(text), _) => {
                if text.chars().count() > MAX_TEXT_CHARS {
                    return Err(AppError::InvalidInput(format!(
                        "Text too long (max {MAX_TEXT_CHARS} chars)"
                    )));
                }
                tracing::debug!(text = %text, "text input");
                (text, None)
            }
            (None, Some(audio)) => self.recognize(audio).await?,
            (None, None) => return Err(AppError::InvalidInput("No input provided".into())),
        };

        let response = self.respond(&text).await?;

        tracing::debug!("converting response to audio");
        let wav = self.synthesizer.synthesize(&response).await?;
        let audio_response = self.store.save_response(&wav).await?;

        let interaction_id = self
            .record(NewInteraction {
                user_input_text: Some(text.clone()),
                user_input_voice_path: voice_path,
                response_text: Some(response.clone()),
                response_voice_path: Some(audio_response.clone()),
            })
            .await;
        tracing::info!(?interaction_id, audio = %audio_response, "request handled");

        Ok(Exchange {
            text_input: text,
            text_response: response,
            audio_response,
        })
    }

    /// Returns the recognized text and, when archiving worked, where the
    /// original clip was kept.
    async fn recognize(&self, audio: Bytes) -> Result<(String, Option<String>), AppError> {
        tracing::debug!(bytes = audio.len(), "processing audio upload");

        let scratch = self.store.stage_scratch(audio.clone()).await?;
        let recognized = self.transcriber.transcribe(scratch.path()).await;
        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "failed to remove scratch upload");
        }
        let text = recognized?;
        tracing::debug!(text = %text, "recognized text");

        let voice_path = match self.store.archive_upload(&audio).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "failed to archive upload");
                None
            }
        };

        Ok((text, voice_path))
    }

    async fn respond(&self, text: &str) -> Result<String, AppError> {
        match self.intents.resolve(text) {
            MatchResult::Canned(reply) => {
                tracing::debug!(reply = %reply, "predefined intent matched");
                Ok(reply)
            }
            MatchResult::NoMatch => {
                tracing::debug!("no intent matched, fetching completion");
                self.chat.complete(text).await
            }
        }
    }

    // A reply the user already has is not thrown away because the log write
    // failed; the failure is reported here instead.
    async fn record(&self, interaction: NewInteraction) -> Option<i64> {
        let log = self.log.clone();
        let outcome = tokio::task::spawn_blocking(move || log.record(interaction))
            .await
            .map_err(|e| AppError::Persistence(format!("record task failed: {e}")))
            .and_then(|result| result);

        match outcome {
            Ok(row) => Some(row.id),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist interaction");
                None
            }
        }
    }
}
