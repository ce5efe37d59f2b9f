use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Channel, InputError};

/// A closed set of emotion categories produced by one classifier
pub trait EmotionCategory: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Channel whose classifier emits this category set
    const CHANNEL: Channel;

    /// Full category name as shown to users
    fn label(&self) -> &'static str;

    /// Parse a model output label (short code or full name)
    fn parse(label: &str) -> Option<Self>;
}

/// Vocal-tone categories of the acoustic model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEmotion {
    Angry,
    Happy,
    Neutral,
    Sad,
}

impl EmotionCategory for AudioEmotion {
    const CHANNEL: Channel = Channel::Audio;

    fn label(&self) -> &'static str {
        match self {
            Self::Angry => "angry",
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
        }
    }

    fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "ang" | "angry" => Some(Self::Angry),
            "hap" | "happy" => Some(Self::Happy),
            "neu" | "neutral" => Some(Self::Neutral),
            "sad" => Some(Self::Sad),
            _ => None,
        }
    }
}

/// Content categories of the semantic model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEmotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl EmotionCategory for TextEmotion {
    const CHANNEL: Channel = Channel::Text;

    fn label(&self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Sadness => "sadness",
            Self::Anger => "anger",
            Self::Fear => "fear",
            Self::Surprise => "surprise",
            Self::Disgust => "disgust",
            Self::Neutral => "neutral",
        }
    }

    fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "joy" => Some(Self::Joy),
            "sadness" => Some(Self::Sadness),
            "anger" => Some(Self::Anger),
            "fear" => Some(Self::Fear),
            "surprise" => Some(Self::Surprise),
            "disgust" => Some(Self::Disgust),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for AudioEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for TextEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (category, confidence) pair from a classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionPrediction<C> {
    pub category: C,
    pub score: f32,
}

impl<C: EmotionCategory> EmotionPrediction<C> {
    /// Create a prediction, rejecting scores outside [0, 1]
    pub fn new(category: C, score: f32) -> Result<Self, InputError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(InputError::ScoreOutOfRange {
                label: category.label().to_string(),
                score,
            });
        }
        Ok(Self { category, score })
    }

    /// Build a prediction from a raw model label, mapping short codes to categories
    pub fn from_raw(label: &str, score: f32) -> Result<Self, InputError> {
        let category = C::parse(label).ok_or_else(|| InputError::UnknownCategory {
            channel: C::CHANNEL,
            label: label.to_string(),
        })?;
        Self::new(category, score)
    }

    pub fn label(&self) -> &'static str {
        self.category.label()
    }
}

/// Sort predictions by descending confidence.
///
/// The sort is stable, so equal scores keep the order the model emitted them in.
pub fn rank<C>(predictions: &mut [EmotionPrediction<C>]) {
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
}
