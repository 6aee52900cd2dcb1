//! Fakes and fixtures shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempDir;

use crate::assistant::Assistant;
use crate::chat::ChatCompletion;
use crate::db::{self, InteractionLog};
use crate::error::AppError;
use crate::intents::IntentResolver;
use crate::speech::{Synthesizer, Transcriber};
use crate::storage::AudioStore;

pub fn wav_with_samples(count: usize) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec).unwrap();
        for i in 0..count {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    buffer.into_inner()
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub struct FakeTranscriber {
    outcome: Result<String, fn(String) -> AppError>,
    /// Every path handed over, and whether it existed at that moment.
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeTranscriber {
    pub fn hearing(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(kind: fn(String) -> AppError) -> Self {
        Self {
            outcome: Err(kind),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, AppError> {
        self.seen
            .lock()
            .unwrap()
            .push((audio_path.to_path_buf(), audio_path.exists()));
        self.outcome
            .clone()
            .map_err(|kind| kind("fake recognizer failure".into()))
    }
}

#[derive(Default)]
pub struct FakeSynthesizer {
    pub texts: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(wav_with_samples(64))
    }
}

pub struct FakeChat {
    reply: Option<String>,
    calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn broken() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatCompletion for FakeChat {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| AppError::CompletionService("fake completion failure".into()))
    }
}

/// An assistant wired to fakes, a temp directory and an in-memory log.
pub struct Harness {
    pub dir: TempDir,
    pub transcriber: Arc<FakeTranscriber>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub chat: Arc<FakeChat>,
    pub store: AudioStore,
    pub log: InteractionLog,
}

impl Harness {
    pub async fn new(transcriber: FakeTranscriber, chat: FakeChat) -> Self {
        Self::with_log(transcriber, chat, InteractionLog::new(db::connect_memory())).await
    }

    pub async fn with_log(transcriber: FakeTranscriber, chat: FakeChat, log: InteractionLog) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(
            dir.path().join("audio_files"),
            dir.path().join("uploads"),
            dir.path().join("scratch"),
        );
        store.ensure_dirs().await.unwrap();

        Self {
            dir,
            transcriber: Arc::new(transcriber),
            synthesizer: Arc::new(FakeSynthesizer::default()),
            chat: Arc::new(chat),
            store,
            log,
        }
    }

    pub fn assistant(&self) -> Assistant {
        Assistant::new(
            IntentResolver::default(),
            self.transcriber.clone(),
            self.synthesizer.clone(),
            self.chat.clone(),
            self.store.clone(),
            self.log.clone(),
        )
    }

    pub fn files_in(&self, sub: &str) -> Vec<PathBuf> {
        std::fs::read_dir(self.dir.path().join(sub))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}
