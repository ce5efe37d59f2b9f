//! One analysis request, end to end.
//!
//! Decode, transcribe, resolve the language, then run both emotion channels
//! concurrently and fuse them. Any failure aborts the request; no partial
//! transcript is ever returned.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::audio::{load_audio, AudioInput};
use crate::config::Config;
use crate::emotion::{
    AudioEmotionClassifier, EmotionModelLoader, OnnxEmotionLoader, TextEmotionClassifier,
};
use crate::error::{AnalysisError, AudioError, ModelError, Stage};
use crate::fusion::{annotate, AnnotatedTranscript};
use crate::models::{CallGuard, ModelRegistry, DEFAULT_MODEL_TIMEOUT};
use crate::transcription::{
    LanguageDetector, LinguaDetector, ModelSize, RawTranscript, SpeechModelId, SpeechModelLoader,
    Transcriber, TranscriptionResult, WhisperLoader,
};

/// Per-request options
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub model_size: ModelSize,
    /// ISO 639-1 code; also selects the English-only checkpoint for "en"
    pub forced_language: Option<String>,
    /// Trace every prediction of both channels
    pub debug: bool,
    /// Budget for each model call
    pub timeout: Duration,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            model_size: ModelSize::default(),
            forced_language: None,
            debug: false,
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }
}

impl AnalysisRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model_size: config.whisper_model,
            forced_language: config.language.clone(),
            debug: false,
            timeout: config.model_timeout(),
        }
    }
}

/// A finished request: the annotated transcript plus bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub request_id: Uuid,
    /// Whisper checkpoint that produced the transcript
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub result: AnnotatedTranscript,
}

/// The multimodal analysis pipeline.
///
/// Cheap to share: every model lives in the registry's caches, so concurrent
/// requests load each model once.
#[derive(Clone)]
pub struct EmotionPipeline {
    transcriber: Transcriber,
    detector: Arc<dyn LanguageDetector>,
    audio_classifier: AudioEmotionClassifier,
    text_classifier: TextEmotionClassifier,
}

impl EmotionPipeline {
    pub fn new(
        registry: &ModelRegistry,
        speech_loader: Arc<dyn SpeechModelLoader>,
        emotion_loader: Arc<dyn EmotionModelLoader>,
        detector: Arc<dyn LanguageDetector>,
    ) -> Self {
        Self {
            transcriber: Transcriber::new(registry.speech.clone(), speech_loader),
            detector,
            audio_classifier: AudioEmotionClassifier::new(
                registry.audio_emotion.clone(),
                emotion_loader.clone(),
            ),
            text_classifier: TextEmotionClassifier::new(registry.text_emotion.clone(), emotion_loader),
        }
    }

    /// Whisper, ONNX and lingua backends over the configured model store
    pub fn from_config(config: &Config, registry: &ModelRegistry) -> anyhow::Result<Self> {
        let store = config.model_store()?;
        info!("Models directory: {:?}", store.models_dir());

        Ok(Self::new(
            registry,
            Arc::new(WhisperLoader::new(store.clone(), config.n_threads)),
            Arc::new(OnnxEmotionLoader::new(store, config.onnx_config())),
            Arc::new(LinguaDetector::new()),
        ))
    }

    /// Analyze one recording.
    ///
    /// Cancelling `cancel` aborts whichever model call is in flight.
    pub async fn analyze(
        &self,
        input: AudioInput,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("analysis", %request_id);

        async move {
            let started_at = Utc::now();
            let start = Instant::now();
            let guard = CallGuard::new(request.timeout, cancel);
            let model = SpeechModelId::resolve(request.model_size, request.forced_language.as_deref());

            let result = self.run(input, request, &guard).await?;

            let elapsed_ms = start.elapsed().as_millis() as u64;
            info!("Analysis complete in {}ms", elapsed_ms);

            Ok(AnalysisRecord {
                request_id,
                model: model.id(),
                started_at,
                elapsed_ms,
                result,
            })
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        input: AudioInput,
        request: &AnalysisRequest,
        guard: &CallGuard,
    ) -> Result<AnnotatedTranscript, AnalysisError> {
        let start = Instant::now();
        let audio = tokio::task::spawn_blocking(move || load_audio(input))
            .await
            .map_err(|e| AudioError::Decode(format!("decode task failed: {}", e)))??;
        debug!("Audio ready in {}ms ({} samples)", start.elapsed().as_millis(), audio.len());

        let start = Instant::now();
        let raw = self
            .transcriber
            .transcribe(
                audio.clone(),
                request.model_size,
                request.forced_language.as_deref(),
                guard,
            )
            .await?;
        debug!("Transcription took {}ms", start.elapsed().as_millis());

        let transcription = self.resolve_language(raw, guard).await?;
        info!(
            "Transcribed {} chars (model language: {:?}, detected: {:?})",
            transcription.text.chars().count(),
            transcription.model_language,
            transcription.detected_language
        );

        let start = Instant::now();
        let (audio_predictions, text_predictions) = tokio::try_join!(
            self.audio_classifier.classify(audio, guard),
            self.text_classifier.classify(&transcription.text, guard),
        )?;
        debug!("Emotion classification took {}ms", start.elapsed().as_millis());

        Ok(annotate(
            transcription,
            &audio_predictions,
            &text_predictions,
            request.debug,
        )?)
    }

    /// Language consensus on the blocking pool.
    ///
    /// A detector that overruns the call budget or panics degrades to the
    /// model's language; only cancellation fails the request here.
    async fn resolve_language(
        &self,
        raw: RawTranscript,
        guard: &CallGuard,
    ) -> Result<TranscriptionResult, ModelError> {
        // Building the detector is slow the first time
        let detector = self.detector.clone();
        let fallback = raw.clone();
        let task = tokio::task::spawn_blocking(move || {
            TranscriptionResult::from_raw(raw, detector.as_ref())
        });

        tokio::select! {
            biased;
            _ = guard.cancel_token().cancelled() => {
                Err(ModelError::Cancelled { stage: Stage::Transcription })
            }
            result = tokio::time::timeout(guard.timeout(), task) => Ok(match result {
                Ok(Ok(transcription)) => transcription,
                Ok(Err(e)) => {
                    warn!("Language detection failed, using model language: {}", e);
                    TranscriptionResult::without_detection(fallback)
                }
                Err(_) => {
                    warn!(
                        "Language detection exceeded {:?}, using model language",
                        guard.timeout()
                    );
                    TranscriptionResult::without_detection(fallback)
                }
            }),
        }
    }
}
