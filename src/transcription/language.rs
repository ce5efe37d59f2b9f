//! Language consensus between the speech model and an independent text detector.
//!
//! The text detector wins when it produces an answer. Short text, a detector
//! failure, or no detection all fall back to the speech model's own guess.
//! Nothing here is an error from the caller's point of view.

use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Minimum transcript length (in characters) before text detection is attempted
pub const MIN_DETECTION_CHARS: usize = 6;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Text too short for detection ({0} chars)")]
    TooShort(usize),

    #[error("Language detection failed: {0}")]
    Failed(String),
}

/// Statistical language identification over text
pub trait LanguageDetector: Send + Sync {
    /// ISO 639-1 code of the text's language, or `None` if undecided
    fn detect(&self, text: &str) -> Result<Option<String>, DetectionError>;
}

/// N-gram detector over every language lingua knows.
///
/// Built on first use; building loads the language models. Detection is
/// deterministic, so identical text always gets the same answer.
#[derive(Default)]
pub struct LinguaDetector {
    detector: OnceLock<lingua::LanguageDetector>,
}

impl LinguaDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn detector(&self) -> &lingua::LanguageDetector {
        self.detector.get_or_init(|| {
            debug!("Building text language detector");
            lingua::LanguageDetectorBuilder::from_all_languages().build()
        })
    }
}

impl LanguageDetector for LinguaDetector {
    fn detect(&self, text: &str) -> Result<Option<String>, DetectionError> {
        let chars = text.chars().count();
        if chars < MIN_DETECTION_CHARS {
            return Err(DetectionError::TooShort(chars));
        }

        Ok(self
            .detector()
            .detect_language_of(text)
            .map(|language| language.iso_code_639_1().to_string()))
    }
}

/// Outcome of language consensus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConsensus {
    /// What the text detector said, if it said anything
    pub detected: Option<String>,
    /// Detector output, else the model's language, else absent
    pub resolved: Option<String>,
}

/// Resolve one language from the transcript text and the model's guess
pub fn resolve_language(
    text: &str,
    model_language: Option<&str>,
    detector: &dyn LanguageDetector,
) -> LanguageConsensus {
    let detected = if text.chars().count() >= MIN_DETECTION_CHARS {
        match detector.detect(text) {
            Ok(language) => language.filter(|l| !l.is_empty()),
            Err(e) => {
                debug!("Falling back to model language: {}", e);
                None
            }
        }
    } else {
        None
    };

    let resolved = detected
        .clone()
        .or_else(|| model_language.filter(|l| !l.is_empty()).map(str::to_string));

    debug!(
        "Language consensus: detected={:?} model={:?} resolved={:?}",
        detected, model_language, resolved
    );

    LanguageConsensus { detected, resolved }
}
