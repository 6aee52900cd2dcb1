use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_pool_size: u32,
    pub audio_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub voices_dir: PathBuf,
    pub voice: String,
    pub tts_pool_size: usize,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub chat_model: String,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
    pub stt_base_url: String,
    pub stt_api_key: Option<String>,
    pub stt_model: String,
    pub intents_file: Option<PathBuf>,
    pub external_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: string("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 3000)?,
            database_url: string("DATABASE_URL", "sqlite://assistant.db"),
            db_pool_size: parse(&lookup, "DB_POOL_SIZE", 4)?,
            audio_dir: string("AUDIO_DIR", "audio_files").into(),
            uploads_dir: string("UPLOADS_DIR", "uploads").into(),
            scratch_dir: optional("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            voices_dir: string("VOICES_DIR", "./voices").into(),
            voice: string("VOICE", "en_US-lessac-medium"),
            tts_pool_size: parse(&lookup, "TTS_POOL_SIZE", 2)?,
            openrouter_api_key: optional("OPENROUTER_API_KEY"),
            openrouter_base_url: string("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            chat_model: string("CHAT_MODEL", "deepseek/deepseek-r1"),
            chat_temperature: parse(&lookup, "CHAT_TEMPERATURE", 0.5)?,
            chat_max_tokens: parse(&lookup, "CHAT_MAX_TOKENS", 1000)?,
            stt_base_url: string("STT_BASE_URL", "https://api.openai.com/v1"),
            stt_api_key: optional("STT_API_KEY"),
            stt_model: string("STT_MODEL", "whisper-1"),
            intents_file: optional("INTENTS_FILE").map(PathBuf::from),
            external_timeout: Duration::from_secs(parse(&lookup, "EXTERNAL_TIMEOUT_SECS", 30)?),
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        None => Ok(default),
    }
}
