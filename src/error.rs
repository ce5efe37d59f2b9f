use std::time::Duration;
use thiserror::Error;

/// Which emotion channel a prediction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Audio,
    Text,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Pipeline stage that makes an external model call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    AudioEmotion,
    TextEmotion,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcription => f.write_str("transcription"),
            Self::AudioEmotion => f.write_str("audio emotion"),
            Self::TextEmotion => f.write_str("text emotion"),
        }
    }
}

/// Malformed data reaching the core (as opposed to a model call failing)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("Empty {0} prediction sequence")]
    EmptyPredictions(Channel),

    #[error("Unknown {channel} emotion category: {label:?}")]
    UnknownCategory { channel: Channel, label: String },

    #[error("Confidence {score} for {label:?} is outside [0, 1]")]
    ScoreOutOfRange { label: String, score: f32 },
}

/// Failures of the external models (loading or inference)
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to load model {model}: {message}")]
    Load { model: String, message: String },

    #[error("{stage} inference failed: {message}")]
    Inference { stage: Stage, message: String },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("{stage} was cancelled")]
    Cancelled { stage: Stage },

    #[error(transparent)]
    Input(#[from] InputError),
}

impl ModelError {
    pub fn load(model: impl Into<String>, message: impl ToString) -> Self {
        Self::Load {
            model: model.into(),
            message: message.to_string(),
        }
    }

    pub fn inference(stage: Stage, message: impl ToString) -> Self {
        Self::Inference {
            stage,
            message: message.to_string(),
        }
    }
}

/// Audio could not be read or decoded
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to open audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Failed to resample audio: {0}")]
    Resample(String),

    #[error("Audio contains no samples")]
    Empty,
}

/// Everything that can abort a single analysis request
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl AnalysisError {
    /// True when the request failed on malformed data rather than a model call.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Input(_) | Self::Model(ModelError::Input(_)))
    }
}
