use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// The `<voice>.onnx.json` file that ships next to every Piper model.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    pub audio: AudioConfig,
    pub espeak: Option<EspeakConfig>,
    #[serde(default)]
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
    #[serde(default)]
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakConfig {
    pub voice: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            noise_scale: 0.667,
            length_scale: 1.0,
            noise_w: 0.8,
        }
    }
}

#[derive(Debug)]
pub struct Voice {
    pub id: String,
    pub config: VoiceConfig,
    pub model_path: PathBuf,
}

impl Voice {
    pub fn load(voices_dir: &Path, voice_id: &str) -> Result<Self, AppError> {
        let model_path = voices_dir.join(format!("{voice_id}.onnx"));
        let config_path = voices_dir.join(format!("{voice_id}.onnx.json"));

        for required in [&model_path, &config_path] {
            if !required.is_file() {
                return Err(AppError::Config(format!(
                    "voice '{voice_id}' is missing {}",
                    required.display()
                )));
            }
        }

        let config: VoiceConfig = serde_json::from_reader(File::open(&config_path)?)?;

        Ok(Self {
            id: voice_id.to_string(),
            config,
            model_path,
        })
    }

    /// espeak-ng voice used for phonemization.
    pub fn espeak_voice(&self) -> &str {
        self.config
            .espeak
            .as_ref()
            .map_or("en", |e| e.voice.as_str())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.audio.sample_rate
    }
}
