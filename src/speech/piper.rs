//! Local speech synthesis with Piper voices.
//!
//! An ONNX session is not shareable between concurrent runs, so engines sit
//! in an explicit pool and every synthesis checks one out exclusively on the
//! blocking thread pool. Engines are built lazily, up to the pool size.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tokio::sync::Semaphore;

use super::voice::{InferenceConfig, Voice};
use super::{script, Synthesizer};
use crate::error::AppError;

const SILENCE: &[i64] = &[0];

pub struct PiperEngine {
    session: Session,
    inference: InferenceConfig,
}

impl PiperEngine {
    pub fn new(voice: &Voice) -> Result<Self, AppError> {
        let session = Session::builder()
            .map_err(|e| AppError::Synthesis(format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| AppError::Synthesis(format!("optimization level: {e}")))?
            .with_intra_threads(2)
            .map_err(|e| AppError::Synthesis(format!("intra threads: {e}")))?
            .commit_from_file(&voice.model_path)
            .map_err(|e| {
                AppError::Synthesis(format!("loading {}: {e}", voice.model_path.display()))
            })?;

        tracing::debug!(voice = %voice.id, "piper engine loaded");

        Ok(Self {
            session,
            inference: voice.config.inference,
        })
    }

    pub fn infer(&mut self, phoneme_ids: &[i64]) -> Result<Vec<f32>, AppError> {
        if phoneme_ids.is_empty() {
            return Ok(Vec::new());
        }

        let len = phoneme_ids.len();

        // input [1, n], input_lengths [1], scales [3]
        let input = Value::from_array((vec![1, len], phoneme_ids.to_vec()))
            .map_err(|e| tensor_err("input", e))?;
        let lengths = Value::from_array((vec![1], vec![len as i64]))
            .map_err(|e| tensor_err("lengths", e))?;
        let scales = Value::from_array((
            vec![3],
            vec![
                self.inference.noise_scale,
                self.inference.length_scale,
                self.inference.noise_w,
            ],
        ))
        .map_err(|e| tensor_err("scales", e))?;

        let outputs = self
            .session
            .run(ort::inputs![input, lengths, scales])
            .map_err(|e| AppError::Synthesis(format!("inference: {e}")))?;

        let audio = outputs
            .get("output")
            .or_else(|| outputs.get("audio"))
            .ok_or_else(|| AppError::Synthesis("model produced no audio output".into()))?;

        let (_, samples) = audio
            .try_extract_tensor::<f32>()
            .map_err(|e| tensor_err("output", e))?;

        Ok(samples.to_vec())
    }
}

fn tensor_err(what: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Synthesis(format!("{what} tensor: {e}"))
}

/// Phonemize with espeak-ng. Text goes through stdin so it can never be
/// mistaken for a command-line flag.
pub fn phonemize(text: &str, espeak_voice: &str) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let mut child = Command::new("espeak-ng")
        .args(["--ipa", "-q", "--stdin", "-v", espeak_voice])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::Synthesis(format!("cannot run espeak-ng (is it installed?): {e}")))?;

    feed_stdin(&mut child, text.as_bytes())?;

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(AppError::Synthesis(format!(
            "espeak-ng failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // One line per clause.
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

/// Write `input` to the child's stdin and close it. On failure the child is
/// killed and reaped before returning.
fn feed_stdin(child: &mut Child, input: &[u8]) -> Result<(), AppError> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    if let Err(e) = stdin.write_all(input) {
        drop(stdin);
        let _ = child.kill();
        let _ = child.wait();
        return Err(AppError::Synthesis(format!("writing to espeak-ng: {e}")));
    }
    Ok(())
}

/// Map IPA symbols to model ids: BOS, pad, then each known symbol followed by
/// pad, then EOS. Symbols the voice does not know are skipped.
pub fn phonemes_to_ids(phonemes: &str, id_map: &HashMap<String, Vec<i64>>) -> Vec<i64> {
    let symbol = |s: &str| id_map.get(s).map(Vec::as_slice);
    let pad = symbol("_").unwrap_or_default();

    let mut ids = Vec::with_capacity(phonemes.len() * 2 + 2);
    ids.extend_from_slice(symbol("^").unwrap_or(SILENCE));
    ids.extend_from_slice(pad);

    let mut buf = [0u8; 4];
    for ch in phonemes.chars() {
        if let Some(mapped) = symbol(&*ch.encode_utf8(&mut buf)) {
            ids.extend_from_slice(mapped);
            ids.extend_from_slice(pad);
        }
    }

    ids.extend_from_slice(symbol("$").unwrap_or(SILENCE));
    ids
}

/// Encode mono float samples as 16-bit PCM WAV, normalized to full scale.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AppError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| AppError::Synthesis(format!("WAV encoding: {e}"));

    let peak = samples.iter().fold(0.01_f32, |peak, s| peak.max(s.abs()));
    let gain = f32::from(i16::MAX) / peak;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec).map_err(wav_err)?;
        for sample in samples {
            let scaled = (sample * gain).clamp(f32::from(i16::MIN), f32::from(i16::MAX));
            writer.write_sample(scaled as i16).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }

    Ok(buffer.into_inner())
}

/// At most `size` engines exist, and each one is used by a single job at a
/// time. Engines are created on demand and returned after every job, whether
/// it succeeded or not.
struct EnginePool<E> {
    idle: Mutex<Vec<E>>,
    permits: Arc<Semaphore>,
}

impl<E: Send + 'static> EnginePool<E> {
    fn new(size: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(size)),
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    fn checkout(&self) -> Option<E> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    fn checkin(&self, engine: E) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(engine);
    }

    /// Run `work` on the blocking pool with an exclusively held engine.
    async fn run<T, M, W>(self: &Arc<Self>, make: M, work: W) -> Result<T, AppError>
    where
        T: Send + 'static,
        M: FnOnce() -> Result<E, AppError> + Send + 'static,
        W: FnOnce(&mut E) -> Result<T, AppError> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AppError::Synthesis("engine pool closed".into()))?;
        let pool = Arc::clone(self);

        // The permit and the engine travel with the blocking job, so a timed
        // out request cannot push the pool past its size.
        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut engine = match pool.checkout() {
                Some(engine) => engine,
                None => make()?,
            };
            let result = work(&mut engine);
            pool.checkin(engine);
            result
        });

        job.await
            .map_err(|e| AppError::Synthesis(format!("synthesis task failed: {e}")))?
    }
}

pub struct PiperSynthesizer {
    voice: Arc<Voice>,
    pool: Arc<EnginePool<PiperEngine>>,
    timeout: Duration,
}

impl PiperSynthesizer {
    pub fn new(voice: Voice, pool_size: usize, timeout: Duration) -> Self {
        Self {
            voice: Arc::new(voice),
            pool: Arc::new(EnginePool::new(pool_size)),
            timeout,
        }
    }

    async fn run(&self, script: String) -> Result<Vec<u8>, AppError> {
        let for_engine = Arc::clone(&self.voice);
        let voice = Arc::clone(&self.voice);
        self.pool
            .run(
                move || PiperEngine::new(&for_engine),
                move |engine| render(engine, &voice, &script),
            )
            .await
    }
}

#[async_trait]
impl Synthesizer for PiperSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError> {
        let script = script::prepare(text);
        tracing::debug!(voice = %self.voice.id, chars = script.len(), "synthesizing reply");

        tokio::time::timeout(self.timeout, self.run(script))
            .await
            .map_err(|_| AppError::Synthesis(format!("timed out after {:?}", self.timeout)))?
    }
}

fn render(engine: &mut PiperEngine, voice: &Voice, script: &str) -> Result<Vec<u8>, AppError> {
    let phonemes = phonemize(script, voice.espeak_voice())?;
    let ids = phonemes_to_ids(&phonemes, &voice.config.phoneme_id_map);
    let samples = engine.infer(&ids)?;
    samples_to_wav(&samples, voice.sample_rate())
}
