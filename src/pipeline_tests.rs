//! End-to-end pipeline tests over in-memory backends.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::audio::AudioInput;
use crate::emotion::{
    AudioEmotion, AudioEmotionModel, EmotionModelLoader, RawScores, TextEmotion, TextEmotionModel,
};
use crate::error::{AnalysisError, AudioError, Channel, InputError, ModelError, Stage};
use crate::models::ModelRegistry;
use crate::pipeline::{AnalysisRequest, EmotionPipeline};
use crate::transcription::{
    DetectionError, LanguageDetector, RawTranscript, SpeechModelId, SpeechModelLoader, SpeechToText,
};

fn raw(pairs: &[(&str, f32)]) -> RawScores {
    pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect()
}

fn wav(secs: f32) -> AudioInput {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(16000.0 * secs) as usize {
            let s = (i as f32 * 0.05).sin() * 8000.0;
            writer.write_sample(s as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    AudioInput::Bytes(cursor.into_inner())
}

struct FakeSpeech {
    text: String,
    language: Option<String>,
    delay: Duration,
}

impl SpeechToText for FakeSpeech {
    fn transcribe(&self, audio: &[f32], language: Option<&str>) -> Result<RawTranscript, ModelError> {
        assert!(!audio.is_empty());
        std::thread::sleep(self.delay);
        Ok(RawTranscript {
            text: self.text.clone(),
            language: language.map(str::to_string).or_else(|| self.language.clone()),
        })
    }
}

struct FakeSpeechLoader {
    text: String,
    language: Option<String>,
    delay: Duration,
    loads: AtomicUsize,
}

impl FakeSpeechLoader {
    fn new(text: &str, language: Option<&str>) -> Self {
        Self {
            text: text.to_string(),
            language: language.map(str::to_string),
            delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
        }
    }
}

impl SpeechModelLoader for FakeSpeechLoader {
    fn load(&self, _model: &SpeechModelId) -> Result<Arc<dyn SpeechToText>, ModelError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeSpeech {
            text: self.text.clone(),
            language: self.language.clone(),
            delay: self.delay,
        }))
    }
}

struct FakeAudioModel(RawScores);

impl AudioEmotionModel for FakeAudioModel {
    fn classify(&self, _audio: &[f32]) -> Result<RawScores, ModelError> {
        Ok(self.0.clone())
    }
}

struct FakeTextModel(RawScores);

impl TextEmotionModel for FakeTextModel {
    fn classify(&self, _text: &str) -> Result<RawScores, ModelError> {
        Ok(self.0.clone())
    }
}

struct FakeEmotionLoader {
    audio: RawScores,
    text: Option<RawScores>,
    loads: AtomicUsize,
}

impl FakeEmotionLoader {
    fn new(audio: RawScores, text: RawScores) -> Self {
        Self {
            audio,
            text: Some(text),
            loads: AtomicUsize::new(0),
        }
    }
}

impl EmotionModelLoader for FakeEmotionLoader {
    fn audio_key(&self) -> String {
        "audio-emotion:fake".to_string()
    }

    fn text_key(&self) -> String {
        "text-emotion:fake".to_string()
    }

    fn load_audio(&self) -> Result<Arc<dyn AudioEmotionModel>, ModelError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeAudioModel(self.audio.clone())))
    }

    fn load_text(&self) -> Result<Arc<dyn TextEmotionModel>, ModelError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Some(scores) => Ok(Arc::new(FakeTextModel(scores.clone()))),
            None => Err(ModelError::load("text-emotion:fake", "missing weights")),
        }
    }
}

struct FixedDetector(Option<&'static str>);

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> Result<Option<String>, DetectionError> {
        Ok(self.0.map(str::to_string))
    }
}

struct FailingDetector;

impl LanguageDetector for FailingDetector {
    fn detect(&self, _text: &str) -> Result<Option<String>, DetectionError> {
        Err(DetectionError::Failed("no model".to_string()))
    }
}

struct SlowDetector(Duration);

impl LanguageDetector for SlowDetector {
    fn detect(&self, _text: &str) -> Result<Option<String>, DetectionError> {
        std::thread::sleep(self.0);
        Ok(Some("fr".to_string()))
    }
}

struct PanickingDetector;

impl LanguageDetector for PanickingDetector {
    fn detect(&self, _text: &str) -> Result<Option<String>, DetectionError> {
        panic!("detector blew up");
    }
}

fn joyful_text() -> RawScores {
    raw(&[
        ("joy", 0.82),
        ("neutral", 0.08),
        ("surprise", 0.04),
        ("sadness", 0.02),
        ("fear", 0.02),
        ("anger", 0.01),
        ("disgust", 0.01),
    ])
}

fn pipeline(
    speech: Arc<FakeSpeechLoader>,
    emotion: Arc<FakeEmotionLoader>,
    detector: Arc<dyn LanguageDetector>,
) -> EmotionPipeline {
    EmotionPipeline::new(&ModelRegistry::default(), speech, emotion, detector)
}

#[tokio::test]
async fn test_strongly_happy_recording() {
    let speech = Arc::new(FakeSpeechLoader::new("I am so happy today", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(
        raw(&[("neu", 0.05), ("hap", 0.90), ("ang", 0.03), ("sad", 0.02)]),
        joyful_text(),
    ));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let record = pipeline
        .analyze(wav(0.5), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap();
    let result = &record.result;

    assert_eq!(record.model, "small");
    assert_eq!(result.audio.final_label.to_string(), "strongly happy");
    assert_eq!(result.audio.final_score, 0.90);
    assert_eq!(result.audio.predictions.len(), 3);
    assert_eq!(result.text.final_label, TextEmotion::Joy);
    assert_eq!(result.text.final_score, 0.82);
    assert_eq!(result.text.predictions.len(), 7);
    assert_eq!(result.resolved_language.as_deref(), Some("en"));
    assert_eq!(
        result.to_string(),
        "I am so happy today [strongly happy / joy]"
    );
}

#[tokio::test]
async fn test_near_tie_is_uncertain() {
    let speech = Arc::new(FakeSpeechLoader::new("I don't know what to say", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(
        raw(&[("ang", 0.55), ("sad", 0.48)]),
        raw(&[("neutral", 0.6), ("sadness", 0.4)]),
    ));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let result = pipeline
        .analyze(wav(0.5), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(result.audio.final_label.to_string(), "uncertain (angry/sad)");
    assert_eq!(result.audio.final_label.primary(), AudioEmotion::Angry);
    assert_eq!(result.audio.final_score, 0.55);
}

#[tokio::test]
async fn test_empty_audio_predictions_is_input_error() {
    let speech = Arc::new(FakeSpeechLoader::new("hello there", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(Vec::new(), joyful_text()));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let err = pipeline
        .analyze(wav(0.5), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_input_error());
    assert!(matches!(
        err,
        AnalysisError::Input(InputError::EmptyPredictions(Channel::Audio))
    ));
}

#[tokio::test]
async fn test_unknown_category_is_input_error() {
    let speech = Arc::new(FakeSpeechLoader::new("hello there", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(
        raw(&[("hap", 0.6), ("calm", 0.4)]),
        joyful_text(),
    ));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let err = pipeline
        .analyze(wav(0.5), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_input_error());
}

#[tokio::test]
async fn test_model_load_failure_aborts_request() {
    let speech = Arc::new(FakeSpeechLoader::new("hello there", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader {
        audio: raw(&[("hap", 0.9)]),
        text: None,
        loads: AtomicUsize::new(0),
    });
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let err = pipeline
        .analyze(wav(0.5), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(!err.is_input_error());
    assert!(matches!(err, AnalysisError::Model(ModelError::Load { .. })));
}

#[tokio::test]
async fn test_cancelled_request_loads_nothing() {
    let speech = Arc::new(FakeSpeechLoader::new("hello there", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("hap", 0.9)]), joyful_text()));
    let pipeline = pipeline(speech.clone(), emotion.clone(), Arc::new(FixedDetector(None)));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = pipeline
        .analyze(wav(0.5), &AnalysisRequest::default(), cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Model(ModelError::Cancelled {
            stage: Stage::Transcription
        })
    ));
    assert_eq!(speech.loads.load(Ordering::SeqCst), 0);
    assert_eq!(emotion.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_slow_transcription_times_out() {
    let speech = Arc::new(FakeSpeechLoader {
        delay: Duration::from_millis(500),
        ..FakeSpeechLoader::new("hello there", Some("en"))
    });
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("hap", 0.9)]), joyful_text()));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(None)));

    let request = AnalysisRequest {
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let err = pipeline
        .analyze(wav(0.5), &request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Model(ModelError::Timeout {
            stage: Stage::Transcription,
            ..
        })
    ));
}

#[tokio::test]
async fn test_undecodable_audio_never_reaches_models() {
    let speech = Arc::new(FakeSpeechLoader::new("hello there", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("hap", 0.9)]), joyful_text()));
    let pipeline = pipeline(speech.clone(), emotion, Arc::new(FixedDetector(None)));

    let err = pipeline
        .analyze(
            AudioInput::Bytes(b"not a recording".to_vec()),
            &AnalysisRequest::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Audio(AudioError::Decode(_))));
    assert_eq!(speech.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_short_transcript_keeps_model_language() {
    let speech = Arc::new(FakeSpeechLoader::new("Oui", Some("fr")));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("neu", 0.9)]), joyful_text()));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let result = pipeline
        .analyze(wav(0.25), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(result.detected_language, None);
    assert_eq!(result.resolved_language.as_deref(), Some("fr"));
}

#[tokio::test]
async fn test_detector_overrides_model_language() {
    let speech = Arc::new(FakeSpeechLoader::new("Je suis très content aujourd'hui", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("hap", 0.7)]), joyful_text()));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("fr"))));

    let result = pipeline
        .analyze(wav(0.25), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(result.model_language.as_deref(), Some("en"));
    assert_eq!(result.resolved_language.as_deref(), Some("fr"));
}

#[tokio::test]
async fn test_detector_failure_falls_back() {
    let speech = Arc::new(FakeSpeechLoader::new("hello there friend", None));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("hap", 0.7)]), joyful_text()));
    let pipeline = pipeline(speech, emotion, Arc::new(FailingDetector));

    let result = pipeline
        .analyze(wav(0.25), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(result.resolved_language, None);
    assert_eq!(result.resolved_language_or_unknown(), "Unknown");
}

#[tokio::test]
async fn test_forced_english_selects_english_checkpoint() {
    let speech = Arc::new(FakeSpeechLoader::new("good morning everyone", None));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("neu", 0.7)]), joyful_text()));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let request = AnalysisRequest {
        forced_language: Some("en".to_string()),
        ..Default::default()
    };
    let record = pipeline
        .analyze(wav(0.25), &request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.model, "small.en");
    assert_eq!(record.result.model_language.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_repeated_requests_are_identical_and_load_once() {
    let speech = Arc::new(FakeSpeechLoader::new("I am so happy today", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(
        raw(&[("hap", 0.7), ("neu", 0.2), ("sad", 0.1)]),
        joyful_text(),
    ));
    let pipeline = pipeline(speech.clone(), emotion.clone(), Arc::new(FixedDetector(Some("en"))));
    let request = AnalysisRequest {
        debug: true,
        ..Default::default()
    };

    let first = pipeline
        .analyze(wav(0.5), &request, CancellationToken::new())
        .await
        .unwrap();
    let second = pipeline
        .analyze(wav(0.5), &request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.result, second.result);
    assert_ne!(first.request_id, second.request_id);
    assert_eq!(first.result.audio.final_label.to_string(), "moderately happy");
    assert_eq!(speech.loads.load(Ordering::SeqCst), 1);
    assert_eq!(emotion.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_requests_share_models() {
    let speech = Arc::new(FakeSpeechLoader::new("I am so happy today", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("hap", 0.95)]), joyful_text()));
    let pipeline = pipeline(speech.clone(), emotion.clone(), Arc::new(FixedDetector(Some("en"))));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .analyze(wav(0.25), &AnalysisRequest::default(), CancellationToken::new())
                .await
        }));
    }
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        assert_eq!(record.result.audio.final_label.to_string(), "strongly happy");
    }

    assert_eq!(speech.loads.load(Ordering::SeqCst), 1);
    assert_eq!(emotion.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_record_serializes_labels_as_strings() {
    let speech = Arc::new(FakeSpeechLoader::new("I am so happy today", Some("en")));
    let emotion = Arc::new(FakeEmotionLoader::new(
        raw(&[("hap", 0.5), ("neu", 0.45)]),
        joyful_text(),
    ));
    let pipeline = pipeline(speech, emotion, Arc::new(FixedDetector(Some("en"))));

    let record = pipeline
        .analyze(wav(0.25), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap();
    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["result"]["audio"]["final_label"], "uncertain (happy/neutral)");
    assert_eq!(json["result"]["text"]["final_label"], "joy");
    assert_eq!(json["model"], "small");
}

#[tokio::test]
async fn test_slow_detector_falls_back_to_model_language() {
    let speech = Arc::new(FakeSpeechLoader::new("Guten Morgen allerseits", Some("de")));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("neu", 0.8)]), joyful_text()));
    let pipeline = pipeline(
        speech,
        emotion,
        Arc::new(SlowDetector(Duration::from_millis(400))),
    );

    let request = AnalysisRequest {
        timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let result = pipeline
        .analyze(wav(0.25), &request, CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(result.detected_language, None);
    assert_eq!(result.resolved_language.as_deref(), Some("de"));
    assert_eq!(result.audio.final_label.to_string(), "moderately neutral");
}

#[tokio::test]
async fn test_panicking_detector_falls_back_to_model_language() {
    let speech = Arc::new(FakeSpeechLoader::new("Guten Morgen allerseits", Some("de")));
    let emotion = Arc::new(FakeEmotionLoader::new(raw(&[("hap", 0.9)]), joyful_text()));
    let pipeline = pipeline(speech, emotion, Arc::new(PanickingDetector));

    let result = pipeline
        .analyze(wav(0.25), &AnalysisRequest::default(), CancellationToken::new())
        .await
        .unwrap()
        .result;

    assert_eq!(result.model_language.as_deref(), Some("de"));
    assert_eq!(result.resolved_language.as_deref(), Some("de"));
    assert_eq!(result.text.final_label, TextEmotion::Joy);
}
