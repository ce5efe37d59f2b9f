pub mod language;
pub mod transcriber;
pub mod whisper_provider;

pub use language::{
    resolve_language, DetectionError, LanguageConsensus, LanguageDetector, LinguaDetector,
    MIN_DETECTION_CHARS,
};
pub use transcriber::Transcriber;
pub use whisper_provider::{WhisperLoader, WhisperProvider};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ModelError;

/// Whisper model size selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl Default for ModelSize {
    fn default() -> Self {
        Self::Small
    }
}

impl ModelSize {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Whether an English-only checkpoint exists for this size
    pub fn has_english_variant(&self) -> bool {
        !matches!(self, Self::Large)
    }
}

impl std::str::FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(Self::Tiny),
            "base" => Ok(Self::Base),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(format!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Generic multilingual checkpoint
    Multilingual,
    /// English-only checkpoint (`<size>.en`)
    English,
}

/// Fully resolved speech model: size plus language variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpeechModelId {
    pub size: ModelSize,
    pub variant: ModelVariant,
}

impl SpeechModelId {
    pub fn new(size: ModelSize, variant: ModelVariant) -> Self {
        Self { size, variant }
    }

    /// Pick the checkpoint for a size and an optional forced language.
    ///
    /// Forcing English selects the English-only checkpoint where one exists;
    /// any other language (or none) uses the multilingual checkpoint.
    pub fn resolve(size: ModelSize, forced_language: Option<&str>) -> Self {
        let wants_english = forced_language
            .map(|lang| lang.trim().eq_ignore_ascii_case("en"))
            .unwrap_or(false);

        let variant = if wants_english && size.has_english_variant() {
            ModelVariant::English
        } else {
            ModelVariant::Multilingual
        };

        Self::new(size, variant)
    }

    /// Model identifier, also the cache key: "small", "small.en", ...
    pub fn id(&self) -> String {
        match self.variant {
            ModelVariant::Multilingual => self.size.name().to_string(),
            ModelVariant::English => format!("{}.en", self.size.name()),
        }
    }

    pub fn filename(&self) -> String {
        format!("ggml-{}.bin", self.id())
    }
}

impl std::fmt::Display for SpeechModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

/// What the speech model itself returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTranscript {
    /// Normalized transcript text (may be empty)
    pub text: String,
    /// The model's own language guess (ISO 639-1)
    pub language: Option<String>,
}

/// Transcript plus the outcome of language consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub model_language: Option<String>,
    pub detected_language: Option<String>,
    pub resolved_language: Option<String>,
}

impl TranscriptionResult {
    /// Run language consensus over a raw transcript
    pub fn from_raw(raw: RawTranscript, detector: &dyn LanguageDetector) -> Self {
        let consensus = resolve_language(&raw.text, raw.language.as_deref(), detector);
        Self {
            text: raw.text,
            model_language: raw.language,
            detected_language: consensus.detected,
            resolved_language: consensus.resolved,
        }
    }

    /// Consensus outcome when the detector never answered
    pub fn without_detection(raw: RawTranscript) -> Self {
        let resolved = raw.language.clone().filter(|l| !l.is_empty());
        Self {
            text: raw.text,
            model_language: raw.language,
            detected_language: None,
            resolved_language: resolved,
        }
    }
}

/// A loaded speech-to-text model
pub trait SpeechToText: Send + Sync {
    /// Transcribe 16kHz mono audio; `language` forces the decode language
    fn transcribe(&self, audio: &[f32], language: Option<&str>) -> Result<RawTranscript, ModelError>;
}

/// Loads speech models on first use
pub trait SpeechModelLoader: Send + Sync {
    fn load(&self, model: &SpeechModelId) -> Result<Arc<dyn SpeechToText>, ModelError>;
}

/// Join per-segment texts into one normalized transcript
pub fn normalize_segments<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .filter_map(|segment| {
            let trimmed = segment.as_ref().trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
