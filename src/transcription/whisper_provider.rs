use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{normalize_segments, RawTranscript, SpeechModelId, SpeechModelLoader, SpeechToText};
use crate::audio::TARGET_SAMPLE_RATE;
use crate::error::{ModelError, Stage};
use crate::models::ModelStore;

/// Whisper transcription provider
pub struct WhisperProvider {
    ctx: WhisperContext,
    model: String,
    n_threads: i32,
}

impl WhisperProvider {
    /// Create a new WhisperProvider from a model file path
    pub fn new(model_path: &Path, model: &str, n_threads: i32) -> Result<Self, ModelError> {
        Self::validate_model(model_path, model)?;

        info!("Loading Whisper model from {:?}", model_path);
        let path = model_path
            .to_str()
            .ok_or_else(|| ModelError::load(model, "Invalid model path"))?;
        let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| ModelError::load(model, format!("Failed to load Whisper model: {}", e)))?;

        Ok(Self {
            ctx,
            model: model.to_string(),
            n_threads,
        })
    }

    /// Validate model file
    fn validate_model(path: &Path, model: &str) -> Result<(), ModelError> {
        if !path.exists() {
            return Err(ModelError::load(model, format!("Model file not found: {:?}", path)));
        }

        let metadata = std::fs::metadata(path).map_err(|e| ModelError::load(model, e))?;
        let size_mb = metadata.len() / (1024 * 1024);

        // Loose sanity checks
        if size_mb < 30 {
            return Err(ModelError::load(
                model,
                format!(
                    "Model file too small ({}MB). Expected at least 30MB for a valid Whisper model.",
                    size_mb
                ),
            ));
        }
        if size_mb > 4000 {
            return Err(ModelError::load(
                model,
                format!(
                    "Model file too large ({}MB). Expected at most 4000MB for a Whisper model.",
                    size_mb
                ),
            ));
        }

        if size_mb < 50 || size_mb > 3000 {
            warn!("Model size {}MB is unusual for a Whisper model", size_mb);
        }

        debug!("Model file validated: {}MB", size_mb);
        Ok(())
    }
}

impl SpeechToText for WhisperProvider {
    fn transcribe(&self, audio: &[f32], language: Option<&str>) -> Result<RawTranscript, ModelError> {
        let start_time = std::time::Instant::now();
        let failed = |what: &str, e: whisper_rs::WhisperError| {
            ModelError::inference(Stage::Transcription, format!("{}: {}", what, e))
        };

        debug!(
            "Transcribing {} samples with {} (language: {})",
            audio.len(),
            self.model,
            language.unwrap_or("auto")
        );

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.n_threads);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(Some(language.unwrap_or("auto")));

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| failed("Failed to create Whisper state", e))?;

        state
            .full(params, audio)
            .map_err(|e| failed("Whisper inference failed", e))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| failed("Failed to get segment count", e))?;

        let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
        for i in 0..num_segments {
            if let Ok(segment_text) = state.full_get_segment_text(i) {
                segments.push(segment_text);
            }
        }
        let text = normalize_segments(segments);

        let detected = state
            .full_lang_id_from_state()
            .ok()
            .and_then(whisper_rs::get_lang_str)
            .map(str::to_string);

        let elapsed = start_time.elapsed();
        let rtf = elapsed.as_secs_f32() / (audio.len().max(1) as f32 / TARGET_SAMPLE_RATE as f32);
        debug!(
            "Transcription complete in {:?} (RTF: {:.2}, language: {:?}): \"{}\"",
            elapsed, rtf, detected, text
        );

        Ok(RawTranscript {
            text,
            language: detected,
        })
    }
}

/// Loads Whisper checkpoints from the model store
pub struct WhisperLoader {
    store: ModelStore,
    n_threads: i32,
}

impl WhisperLoader {
    pub fn new(store: ModelStore, n_threads: i32) -> Self {
        Self { store, n_threads }
    }
}

impl SpeechModelLoader for WhisperLoader {
    fn load(&self, model: &SpeechModelId) -> Result<Arc<dyn SpeechToText>, ModelError> {
        let path = self
            .store
            .ensure_whisper_model(model)
            .map_err(|e| ModelError::load(model.id(), e))?;
        let provider = WhisperProvider::new(&path, &model.id(), self.n_threads)?;
        Ok(Arc::new(provider))
    }
}
