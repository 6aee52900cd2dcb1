use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod assistant;
mod chat;
mod config;
mod db;
mod error;
mod intents;
mod speech;
mod storage;
#[cfg(test)]
mod testing;

use api::routes::{create_router, AppState};
use assistant::Assistant;
use chat::OpenRouterClient;
use config::Config;
use db::InteractionLog;
use intents::IntentResolver;
use speech::{voice::Voice, PiperSynthesizer, WhisperTranscriber};
use storage::AudioStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Dollar assistant v{}", env!("CARGO_PKG_VERSION"));

    let intents = match &config.intents_file {
        Some(path) => IntentResolver::with_overrides(path)?,
        None => IntentResolver::default(),
    };
    tracing::info!("Loaded {} intents", intents.len());

    let store = AudioStore::new(
        config.audio_dir.clone(),
        config.uploads_dir.clone(),
        config.scratch_dir.clone(),
    );
    store.ensure_dirs().await?;
    tracing::info!("Audio directory: {}", store.audio_dir().display());

    let pool = db::connect(&config.database_url, config.db_pool_size)?;

    let voice = Voice::load(&config.voices_dir, &config.voice)?;
    tracing::info!("Voice: {} ({} Hz)", voice.id, voice.sample_rate());
    let synthesizer = PiperSynthesizer::new(voice, config.tts_pool_size, config.external_timeout);

    let transcriber = WhisperTranscriber::new(
        &config.stt_base_url,
        config.stt_api_key.clone(),
        config.stt_model.clone(),
        config.external_timeout,
    )?;

    let chat = OpenRouterClient::new(
        &config.openrouter_base_url,
        config.openrouter_api_key.clone(),
        config.chat_model.clone(),
        config.chat_temperature,
        config.chat_max_tokens,
        config.external_timeout,
    )?;

    let assistant = Assistant::new(
        intents,
        Arc::new(transcriber),
        Arc::new(synthesizer),
        Arc::new(chat),
        store,
        InteractionLog::new(pool),
    );

    let state = Arc::new(AppState { assistant });
    let app = create_router(state, config.max_upload_bytes);

    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
