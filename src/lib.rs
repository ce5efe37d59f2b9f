//! Emotion-aware speech transcription.
//!
//! A recording is transcribed with Whisper, its language resolved by consensus
//! between the model and a text detector, and then scored on two channels:
//! vocal tone from the audio and emotional content from the transcript. The
//! fusion stage turns both score distributions into one annotated transcript.

pub mod audio;
pub mod config;
pub mod emotion;
pub mod error;
pub mod fusion;
pub mod models;
pub mod pipeline;
pub mod transcription;

#[cfg(test)]
mod pipeline_tests;

pub use audio::AudioInput;
pub use config::Config;
pub use error::{AnalysisError, AudioError, InputError, ModelError};
pub use fusion::{AnnotatedTranscript, AudioLabel};
pub use models::ModelRegistry;
pub use pipeline::{AnalysisRecord, AnalysisRequest, EmotionPipeline};
