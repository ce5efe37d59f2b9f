//! Emotion classification over two independent channels.
//!
//! The acoustic classifier scores vocal tone over four coarse categories, the
//! semantic classifier scores the transcript over seven. Both adapters turn the
//! models' raw `(label, score)` output into typed, ranked predictions and reject
//! labels outside their category set.

mod audio_classifier;
mod category;
mod onnx;
mod text_classifier;

pub use audio_classifier::{audio_predictions, AudioEmotionClassifier, AUDIO_TOP_K};
pub use category::{rank, AudioEmotion, EmotionCategory, EmotionPrediction, TextEmotion};
pub use onnx::{softmax, OnnxEmotionConfig, OnnxEmotionLoader};
pub use text_classifier::{text_predictions, TextEmotionClassifier};

use std::sync::Arc;

use crate::error::ModelError;

/// Raw classifier output in model order
pub type RawScores = Vec<(String, f32)>;

/// A loaded acoustic emotion model
pub trait AudioEmotionModel: Send + Sync {
    /// Score 16kHz mono audio over every category the model knows
    fn classify(&self, audio: &[f32]) -> Result<RawScores, ModelError>;
}

/// A loaded semantic emotion model
pub trait TextEmotionModel: Send + Sync {
    /// Score text over every category the model knows
    fn classify(&self, text: &str) -> Result<RawScores, ModelError>;
}

/// Loads the emotion models on first use
pub trait EmotionModelLoader: Send + Sync {
    /// Cache key of the acoustic model
    fn audio_key(&self) -> String;
    /// Cache key of the semantic model
    fn text_key(&self) -> String;

    fn load_audio(&self) -> Result<Arc<dyn AudioEmotionModel>, ModelError>;
    fn load_text(&self) -> Result<Arc<dyn TextEmotionModel>, ModelError>;
}
