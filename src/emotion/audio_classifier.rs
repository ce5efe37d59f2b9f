use std::sync::Arc;
use tracing::debug;

use super::category::{rank, AudioEmotion, EmotionPrediction};
use super::{AudioEmotionModel, EmotionModelLoader, RawScores};
use crate::error::{InputError, ModelError, Stage};
use crate::models::{CallGuard, ModelCache};

/// Number of ranked predictions kept from the acoustic model
pub const AUDIO_TOP_K: usize = 3;

/// Map raw acoustic output to the top `k` typed predictions.
///
/// Short codes ("ang", "hap", ...) become full words and the result is re-ranked
/// after mapping. Any label outside the category set is rejected.
pub fn audio_predictions(
    raw: RawScores,
    k: usize,
) -> Result<Vec<EmotionPrediction<AudioEmotion>>, InputError> {
    let mut predictions = raw
        .iter()
        .map(|(label, score)| EmotionPrediction::from_raw(label, *score))
        .collect::<Result<Vec<_>, _>>()?;
    rank(&mut predictions);
    predictions.truncate(k);
    Ok(predictions)
}

/// Audio emotion adapter over the cached acoustic model
#[derive(Clone)]
pub struct AudioEmotionClassifier {
    cache: Arc<ModelCache<dyn AudioEmotionModel>>,
    loader: Arc<dyn EmotionModelLoader>,
}

impl AudioEmotionClassifier {
    pub fn new(
        cache: Arc<ModelCache<dyn AudioEmotionModel>>,
        loader: Arc<dyn EmotionModelLoader>,
    ) -> Self {
        Self { cache, loader }
    }

    /// Top-3 vocal emotions for 16kHz mono audio
    pub async fn classify(
        &self,
        audio: Arc<[f32]>,
        guard: &CallGuard,
    ) -> Result<Vec<EmotionPrediction<AudioEmotion>>, ModelError> {
        let loader = self.loader.clone();
        let model = self
            .cache
            .get_or_load(&self.loader.audio_key(), || {
                guard.run_blocking(Stage::AudioEmotion, move || loader.load_audio())
            })
            .await?;

        let raw = guard
            .run_blocking(Stage::AudioEmotion, move || model.classify(&audio))
            .await?;
        debug!("Audio emotion raw scores: {:?}", raw);

        Ok(audio_predictions(raw, AUDIO_TOP_K)?)
    }
}
