//! ONNX Runtime backends for the two emotion classifiers.

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};

use super::{AudioEmotionModel, EmotionModelLoader, RawScores, TextEmotionModel};
use crate::error::{ModelError, Stage};
use crate::models::ModelStore;

/// Longest token sequence the text model accepts
const MAX_TEXT_TOKENS: usize = 512;

/// Model files and label orders for the emotion classifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnnxEmotionConfig {
    /// wav2vec2 emotion-recognition export, relative to the models directory
    pub audio_model: String,
    /// DistilRoBERTa emotion export, relative to the models directory
    pub text_model: String,
    /// HuggingFace `tokenizer.json` for the text model
    pub text_tokenizer: String,
    /// Output index → label of the acoustic model (its `id2label`)
    pub audio_labels: Vec<String>,
    /// Output index → label of the text model (its `id2label`)
    pub text_labels: Vec<String>,
    /// Number of threads for ONNX inference
    pub n_threads: usize,
}

impl Default for OnnxEmotionConfig {
    fn default() -> Self {
        Self {
            audio_model: "wav2vec2-base-superb-er.onnx".to_string(),
            text_model: "emotion-english-distilroberta-base.onnx".to_string(),
            text_tokenizer: "emotion-english-distilroberta-base.tokenizer.json".to_string(),
            audio_labels: ["neu", "hap", "ang", "sad"].map(String::from).to_vec(),
            text_labels: [
                "anger", "disgust", "fear", "joy", "neutral", "sadness", "surprise",
            ]
            .map(String::from)
            .to_vec(),
            n_threads: 1,
        }
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn open_session(path: &Path, n_threads: usize, model: &str) -> Result<Session, ModelError> {
    let session = Session::builder()
        .map_err(|e| ModelError::load(model, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ModelError::load(model, e))?
        .with_intra_threads(n_threads)
        .map_err(|e| ModelError::load(model, e))?
        .commit_from_file(path)
        .map_err(|e| ModelError::load(model, e))?;

    tracing::info!("Emotion model initialized: {:?}", path);
    Ok(session)
}

/// Pair output probabilities with their labels
fn label_scores(labels: &[String], logits: &[f32], stage: Stage) -> Result<RawScores, ModelError> {
    if logits.len() != labels.len() {
        return Err(ModelError::inference(
            stage,
            format!(
                "Model produced {} scores but {} labels are configured",
                logits.len(),
                labels.len()
            ),
        ));
    }

    Ok(labels
        .iter()
        .cloned()
        .zip(softmax(logits))
        .collect())
}

fn inference_error<E: std::fmt::Display>(stage: Stage) -> impl Fn(E) -> ModelError {
    move |e| ModelError::inference(stage, e)
}

/// Zero-mean, unit-variance normalization expected by wav2vec2
fn normalize_waveform(audio: &[f32]) -> Vec<f32> {
    if audio.is_empty() {
        return Vec::new();
    }
    let n = audio.len() as f32;
    let mean = audio.iter().sum::<f32>() / n;
    let variance = audio.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
    let std = (variance + 1e-7).sqrt();
    audio.iter().map(|x| (x - mean) / std).collect()
}

/// wav2vec2 SUPERB emotion-recognition head
pub struct OnnxAudioEmotionModel {
    session: Mutex<Session>,
    labels: Vec<String>,
}

impl AudioEmotionModel for OnnxAudioEmotionModel {
    fn classify(&self, audio: &[f32]) -> Result<RawScores, ModelError> {
        let stage = Stage::AudioEmotion;

        // Input shape [batch, time]
        let input_tensor = Tensor::from_array(([1_usize, audio.len()], normalize_waveform(audio)))
            .map_err(inference_error(stage))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::inference(stage, "session lock poisoned"))?;
        let outputs = session.run(ort::inputs![input_tensor]).map_err(inference_error(stage))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ModelError::inference(stage, "No output from model"))?;
        let (_, logits) = output.1.try_extract_tensor::<f32>().map_err(inference_error(stage))?;

        label_scores(&self.labels, logits, stage)
    }
}

/// DistilRoBERTa emotion head with its tokenizer
pub struct OnnxTextEmotionModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
}

impl TextEmotionModel for OnnxTextEmotionModel {
    fn classify(&self, text: &str) -> Result<RawScores, ModelError> {
        let stage = Stage::TextEmotion;

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ModelError::inference(stage, format!("Tokenization failed: {}", e)))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let seq_len = ids.len();

        let ids_tensor = Tensor::from_array(([1_usize, seq_len], ids)).map_err(inference_error(stage))?;
        let mask_tensor = Tensor::from_array(([1_usize, seq_len], mask)).map_err(inference_error(stage))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::inference(stage, "session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])
            .map_err(inference_error(stage))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ModelError::inference(stage, "No output from model"))?;
        let (_, logits) = output.1.try_extract_tensor::<f32>().map_err(inference_error(stage))?;

        label_scores(&self.labels, logits, stage)
    }
}

/// Loads both emotion models from the model store
pub struct OnnxEmotionLoader {
    store: ModelStore,
    config: OnnxEmotionConfig,
}

impl OnnxEmotionLoader {
    pub fn new(store: ModelStore, config: OnnxEmotionConfig) -> Self {
        Self { store, config }
    }
}

impl EmotionModelLoader for OnnxEmotionLoader {
    fn audio_key(&self) -> String {
        format!("audio-emotion:{}", self.config.audio_model)
    }

    fn text_key(&self) -> String {
        format!("text-emotion:{}", self.config.text_model)
    }

    fn load_audio(&self) -> Result<Arc<dyn AudioEmotionModel>, ModelError> {
        let model = &self.config.audio_model;
        let path = self
            .store
            .require(model)
            .map_err(|e| ModelError::load(model.as_str(), e))?;
        let session = open_session(&path, self.config.n_threads, model)?;

        Ok(Arc::new(OnnxAudioEmotionModel {
            session: Mutex::new(session),
            labels: self.config.audio_labels.clone(),
        }))
    }

    fn load_text(&self) -> Result<Arc<dyn TextEmotionModel>, ModelError> {
        let model = &self.config.text_model;
        let model_path = self
            .store
            .require(model)
            .map_err(|e| ModelError::load(model.as_str(), e))?;
        let tokenizer_path = self
            .store
            .require(&self.config.text_tokenizer)
            .map_err(|e| ModelError::load(model.as_str(), e))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::load(model.as_str(), format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TEXT_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| ModelError::load(model.as_str(), format!("Invalid truncation: {}", e)))?;

        let session = open_session(&model_path, self.config.n_threads, model)?;

        Ok(Arc::new(OnnxTextEmotionModel {
            session: Mutex::new(session),
            tokenizer,
            labels: self.config.text_labels.clone(),
        }))
    }
}
