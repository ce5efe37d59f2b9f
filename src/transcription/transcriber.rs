use std::sync::Arc;
use tracing::debug;

use super::{ModelSize, RawTranscript, SpeechModelId, SpeechModelLoader, SpeechToText};
use crate::error::{ModelError, Stage};
use crate::models::{CallGuard, ModelCache};

/// Transcription adapter: picks the checkpoint, loads it through the cache,
/// and runs it on the blocking pool
#[derive(Clone)]
pub struct Transcriber {
    cache: Arc<ModelCache<dyn SpeechToText>>,
    loader: Arc<dyn SpeechModelLoader>,
}

impl Transcriber {
    pub fn new(cache: Arc<ModelCache<dyn SpeechToText>>, loader: Arc<dyn SpeechModelLoader>) -> Self {
        Self { cache, loader }
    }

    /// Transcribe 16kHz mono audio.
    ///
    /// Model errors are returned as-is and never retried.
    pub async fn transcribe(
        &self,
        audio: Arc<[f32]>,
        size: ModelSize,
        forced_language: Option<&str>,
        guard: &CallGuard,
    ) -> Result<RawTranscript, ModelError> {
        let model_id = SpeechModelId::resolve(size, forced_language);
        debug!("Transcribing with Whisper {}", model_id);

        let loader = self.loader.clone();
        let model = self
            .cache
            .get_or_load(&model_id.id(), || {
                guard.run_blocking(Stage::Transcription, move || loader.load(&model_id))
            })
            .await?;

        let language = forced_language.map(str::to_string);
        guard
            .run_blocking(Stage::Transcription, move || {
                model.transcribe(&audio, language.as_deref())
            })
            .await
    }
}
