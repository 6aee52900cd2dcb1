pub mod piper;
pub mod script;
pub mod stt;
pub mod voice;

use std::path::Path;

use async_trait::async_trait;

use crate::error::AppError;

pub use piper::PiperSynthesizer;
pub use stt::WhisperTranscriber;

/// Turns a recorded clip into text.
///
/// Implementations report `UnintelligibleAudio` when the clip itself is the
/// problem and `SpeechServiceUnavailable` for everything else.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, AppError>;
}

/// Turns text into WAV bytes.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError>;
}

/// Rejects anything that is not a readable WAV clip with at least one sample.
pub fn validate_wav(bytes: &[u8]) -> Result<hound::WavSpec, AppError> {
    let reader = hound::WavReader::new(std::io::Cursor::new(bytes))
        .map_err(|e| AppError::UnintelligibleAudio(format!("unreadable WAV: {e}")))?;
    if reader.duration() == 0 {
        return Err(AppError::UnintelligibleAudio("audio clip is empty".into()));
    }
    Ok(reader.spec())
}
