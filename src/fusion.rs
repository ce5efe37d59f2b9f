//! Fusion of the two emotion channels into one annotated transcript.
//!
//! The audio channel is banded by intensity and flagged as uncertain when its
//! top two categories are nearly tied. The text channel is reported as-is: its
//! top category and raw confidence, with no banding.
//!
//! The final score of either channel is always the top raw confidence, even
//! when the audio label carries an uncertainty marker.

use serde::{Serialize, Serializer};
use std::fmt;
use tracing::info;

use crate::emotion::{AudioEmotion, EmotionCategory, EmotionPrediction, TextEmotion};
use crate::error::{Channel, InputError};
use crate::transcription::TranscriptionResult;

/// Audio predictions closer than this (rank 1 − rank 2) are ambiguous
pub const AMBIGUITY_GAP: f32 = 0.15;
/// Lower bound of "strongly"
pub const STRONG_THRESHOLD: f32 = 0.85;
/// Lower bound of "moderately"
pub const MODERATE_THRESHOLD: f32 = 0.65;
/// f32 rounding slack on the gap; 0.65 - 0.50 must not come out below 0.15
const GAP_TOLERANCE: f32 = 1e-6;

/// Whether two ranked audio scores are too close to call
pub fn is_ambiguous(top: f32, second: f32) -> bool {
    top - second < AMBIGUITY_GAP - GAP_TOLERANCE
}

/// Qualitative strength of a confident audio prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    Strongly,
    Moderately,
    Slightly,
}

impl Intensity {
    pub fn from_score(score: f32) -> Self {
        if score >= STRONG_THRESHOLD {
            Self::Strongly
        } else if score >= MODERATE_THRESHOLD {
            Self::Moderately
        } else {
            Self::Slightly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strongly => "strongly",
            Self::Moderately => "moderately",
            Self::Slightly => "slightly",
        }
    }
}

/// Human-readable audio label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioLabel {
    /// "strongly happy", "slightly sad", ...
    Qualified {
        intensity: Intensity,
        emotion: AudioEmotion,
    },
    /// "uncertain (angry/sad)"
    Uncertain {
        first: AudioEmotion,
        second: AudioEmotion,
    },
}

impl AudioLabel {
    pub fn is_uncertain(&self) -> bool {
        matches!(self, Self::Uncertain { .. })
    }

    /// The top-ranked category regardless of qualification
    pub fn primary(&self) -> AudioEmotion {
        match self {
            Self::Qualified { emotion, .. } => *emotion,
            Self::Uncertain { first, .. } => *first,
        }
    }
}

impl fmt::Display for AudioLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualified { intensity, emotion } => {
                write!(f, "{} {}", intensity.as_str(), emotion.label())
            }
            Self::Uncertain { first, second } => {
                write!(f, "uncertain ({}/{})", first.label(), second.label())
            }
        }
    }
}

impl Serialize for AudioLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioChannelResult {
    pub predictions: Vec<EmotionPrediction<AudioEmotion>>,
    pub final_label: AudioLabel,
    pub final_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextChannelResult {
    pub predictions: Vec<EmotionPrediction<TextEmotion>>,
    pub final_label: TextEmotion,
    pub final_score: f32,
}

/// Terminal artifact of one analysis request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTranscript {
    pub transcript: String,
    pub resolved_language: Option<String>,
    pub model_language: Option<String>,
    pub detected_language: Option<String>,
    pub audio: AudioChannelResult,
    pub text: TextChannelResult,
}

impl AnnotatedTranscript {
    pub fn resolved_language_or_unknown(&self) -> &str {
        self.resolved_language.as_deref().unwrap_or("Unknown")
    }
}

impl fmt::Display for AnnotatedTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} / {}]",
            self.transcript, self.audio.final_label, self.text.final_label
        )
    }
}

/// Label the audio channel with intensity banding and ambiguity detection.
///
/// `predictions` must already be ranked (descending confidence).
pub fn label_audio(
    predictions: &[EmotionPrediction<AudioEmotion>],
) -> Result<AudioChannelResult, InputError> {
    let (top, rest) = predictions
        .split_first()
        .ok_or(InputError::EmptyPredictions(Channel::Audio))?;

    let final_label = match rest.first() {
        Some(second) if is_ambiguous(top.score, second.score) => AudioLabel::Uncertain {
            first: top.category,
            second: second.category,
        },
        _ => AudioLabel::Qualified {
            intensity: Intensity::from_score(top.score),
            emotion: top.category,
        },
    };

    Ok(AudioChannelResult {
        predictions: predictions.to_vec(),
        final_label,
        final_score: top.score,
    })
}

/// Label the text channel: the top category, unqualified.
pub fn label_text(
    predictions: &[EmotionPrediction<TextEmotion>],
) -> Result<TextChannelResult, InputError> {
    let top = predictions
        .first()
        .ok_or(InputError::EmptyPredictions(Channel::Text))?;

    Ok(TextChannelResult {
        predictions: predictions.to_vec(),
        final_label: top.category,
        final_score: top.score,
    })
}

/// Combine the transcription and both channels into the final record.
///
/// With `debug` set, every prediction of both channels is traced in rank order.
pub fn annotate(
    transcription: TranscriptionResult,
    audio: &[EmotionPrediction<AudioEmotion>],
    text: &[EmotionPrediction<TextEmotion>],
    debug: bool,
) -> Result<AnnotatedTranscript, InputError> {
    let audio = label_audio(audio)?;
    let text = label_text(text)?;

    if debug {
        trace_predictions(&audio.predictions);
        trace_predictions(&text.predictions);
    }

    Ok(AnnotatedTranscript {
        transcript: transcription.text,
        resolved_language: transcription.resolved_language,
        model_language: transcription.model_language,
        detected_language: transcription.detected_language,
        audio,
        text,
    })
}

fn trace_predictions<C: EmotionCategory>(predictions: &[EmotionPrediction<C>]) {
    for (rank, prediction) in predictions.iter().enumerate() {
        info!(
            target: "emotion_asr::trace",
            channel = %C::CHANNEL,
            rank = rank + 1,
            label = prediction.label(),
            score = %format!("{:.2}", prediction.score),
            "prediction"
        );
    }
}
