use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::emotion::OnnxEmotionConfig;
use crate::models::{ModelStore, DEFAULT_MODEL_TIMEOUT};
use crate::transcription::ModelSize;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    pub whisper_model: ModelSize,
    /// Forced transcription language; `None` lets Whisper auto-detect
    pub language: Option<String>,
    pub n_threads: i32,

    // Model files
    pub models_dir: Option<PathBuf>,
    pub audio_emotion_model: String,
    pub text_emotion_model: String,
    pub text_tokenizer: String,
    pub audio_emotion_labels: Vec<String>,
    pub text_emotion_labels: Vec<String>,

    /// Per model call, covering load and inference separately
    pub model_timeout_secs: u64,
    /// Fetch missing Whisper weights on first use
    pub auto_download: bool,
}

impl Default for Config {
    fn default() -> Self {
        let onnx = OnnxEmotionConfig::default();
        Self {
            schema_version: 1,
            whisper_model: ModelSize::Small,
            language: None,
            n_threads: 4,
            models_dir: None,
            audio_emotion_model: onnx.audio_model,
            text_emotion_model: onnx.text_model,
            text_tokenizer: onnx.text_tokenizer,
            audio_emotion_labels: onnx.audio_labels,
            text_emotion_labels: onnx.text_labels,
            model_timeout_secs: DEFAULT_MODEL_TIMEOUT.as_secs(),
            auto_download: true,
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_config_path()?)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".emotion-asr"))
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Get the default models directory
    pub fn default_models_dir() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("models"))
    }

    /// Models directory, honoring the override
    pub fn models_dir(&self) -> Result<PathBuf> {
        match &self.models_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_models_dir(),
        }
    }

    pub fn model_store(&self) -> Result<ModelStore> {
        Ok(ModelStore::new(self.models_dir()?, self.auto_download))
    }

    pub fn onnx_config(&self) -> OnnxEmotionConfig {
        OnnxEmotionConfig {
            audio_model: self.audio_emotion_model.clone(),
            text_model: self.text_emotion_model.clone(),
            text_tokenizer: self.text_tokenizer.clone(),
            audio_labels: self.audio_emotion_labels.clone(),
            text_labels: self.text_emotion_labels.clone(),
            n_threads: self.n_threads.max(1) as usize,
        }
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}
