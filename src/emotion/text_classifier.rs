use std::sync::Arc;
use tracing::debug;

use super::category::{rank, EmotionPrediction, TextEmotion};
use super::{EmotionModelLoader, RawScores, TextEmotionModel};
use crate::error::{InputError, ModelError, Stage};
use crate::models::{CallGuard, ModelCache};

/// Map raw semantic output to the full ranked distribution
pub fn text_predictions(raw: RawScores) -> Result<Vec<EmotionPrediction<TextEmotion>>, InputError> {
    let mut predictions = raw
        .iter()
        .map(|(label, score)| EmotionPrediction::from_raw(label, *score))
        .collect::<Result<Vec<_>, _>>()?;
    rank(&mut predictions);
    Ok(predictions)
}

/// Text emotion adapter over the cached semantic model.
///
/// Empty or whitespace-only transcripts go to the model unchanged.
#[derive(Clone)]
pub struct TextEmotionClassifier {
    cache: Arc<ModelCache<dyn TextEmotionModel>>,
    loader: Arc<dyn EmotionModelLoader>,
}

impl TextEmotionClassifier {
    pub fn new(
        cache: Arc<ModelCache<dyn TextEmotionModel>>,
        loader: Arc<dyn EmotionModelLoader>,
    ) -> Self {
        Self { cache, loader }
    }

    pub async fn classify(
        &self,
        text: &str,
        guard: &CallGuard,
    ) -> Result<Vec<EmotionPrediction<TextEmotion>>, ModelError> {
        let loader = self.loader.clone();
        let model = self
            .cache
            .get_or_load(&self.loader.text_key(), || {
                guard.run_blocking(Stage::TextEmotion, move || loader.load_text())
            })
            .await?;

        let text = text.to_string();
        let raw = guard
            .run_blocking(Stage::TextEmotion, move || model.classify(&text))
            .await?;
        debug!("Text emotion raw scores: {:?}", raw);

        Ok(text_predictions(raw)?)
    }
}
