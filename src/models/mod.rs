//! Model files, downloading, and the shared model cache.
//!
//! Whisper GGML weights can be fetched from the whisper.cpp mirror on first use.
//! The ONNX emotion models and the tokenizer have to be provisioned locally.

pub mod cache;
pub mod guard;

pub use cache::ModelCache;
pub use guard::{CallGuard, DEFAULT_MODEL_TIMEOUT};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::emotion::{AudioEmotionModel, TextEmotionModel};
use crate::transcription::{SpeechModelId, SpeechToText};

/// Every model cache the process owns, one per model kind
#[derive(Default, Clone)]
pub struct ModelRegistry {
    pub speech: Arc<ModelCache<dyn SpeechToText>>,
    pub audio_emotion: Arc<ModelCache<dyn AudioEmotionModel>>,
    pub text_emotion: Arc<ModelCache<dyn TextEmotionModel>>,
}

/// Base URL for Whisper GGML models
const WHISPER_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Errors that can occur while locating or fetching model files
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Model not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to download model: {0}")]
    DownloadError(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),

    #[error("Failed to write model file: {0}")]
    WriteError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Locates model files under a single models directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
    auto_download: bool,
}

impl ModelStore {
    pub fn new(models_dir: impl Into<PathBuf>, auto_download: bool) -> Self {
        Self {
            models_dir: models_dir.into(),
            auto_download,
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path of a file in the models directory, which must already exist
    pub fn require(&self, filename: &str) -> Result<PathBuf, StoreError> {
        let path = self.models_dir.join(filename);
        if path.exists() {
            Ok(path)
        } else {
            Err(StoreError::NotFound(path))
        }
    }

    /// Path of a Whisper model, downloading it first if allowed and missing
    pub fn ensure_whisper_model(&self, model: &SpeechModelId) -> Result<PathBuf, StoreError> {
        let model_path = self.models_dir.join(model.filename());

        if model_path.exists() {
            debug!("Whisper model already exists: {:?}", model_path);
            return Ok(model_path);
        }

        if !self.auto_download {
            return Err(StoreError::NotFound(model_path));
        }

        info!("Downloading Whisper {} model...", model.id());
        download_file(&whisper_url(model), &model_path)?;
        Ok(model_path)
    }
}

/// Download URL for a Whisper model
pub fn whisper_url(model: &SpeechModelId) -> String {
    format!("{}/{}", WHISPER_BASE_URL, model.filename())
}

/// Download a file from URL to the specified path
fn download_file(url: &str, dest_path: &Path) -> Result<(), StoreError> {
    info!("Downloading from {} to {:?}", url, dest_path);

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::DirectoryError(e.to_string()))?;
    }

    let response = reqwest::blocking::Client::new()
        .get(url)
        .send()
        .map_err(|e| StoreError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(StoreError::DownloadError(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length();
    info!(
        "Download started, total size: {}",
        total_size
            .map(|s| format!("{:.1} MB", s as f64 / 1_000_000.0))
            .unwrap_or_else(|| "unknown".to_string())
    );

    // Temp file until the download completes
    let temp_path = dest_path.with_extension("download");
    let mut file = File::create(&temp_path).map_err(|e| StoreError::WriteError(e.to_string()))?;

    let bytes = response
        .bytes()
        .map_err(|e| StoreError::NetworkError(e.to_string()))?;

    file.write_all(&bytes)
        .map_err(|e| StoreError::WriteError(e.to_string()))?;
    file.flush()
        .map_err(|e| StoreError::WriteError(e.to_string()))?;

    fs::rename(&temp_path, dest_path).map_err(|e| StoreError::WriteError(e.to_string()))?;

    info!("Download complete: {:?}", dest_path);
    Ok(())
}
