pub mod decode;
pub mod resampler;

pub use decode::{decode_bytes, decode_file, DecodedAudio};
pub use resampler::{resample_to_target, AudioResampler, TARGET_SAMPLE_RATE};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::AudioError;

/// Where the audio to analyze comes from
#[derive(Debug, Clone)]
pub enum AudioInput {
    Path(PathBuf),
    /// An encoded file already in memory
    Bytes(Vec<u8>),
}

impl From<PathBuf> for AudioInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for AudioInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Decode and resample to 16kHz mono f32.
///
/// Blocking; run it off the async runtime.
pub fn load_audio(input: AudioInput) -> Result<Arc<[f32]>, AudioError> {
    let decoded = match input {
        AudioInput::Path(path) => decode_file(&path)?,
        AudioInput::Bytes(bytes) => decode_bytes(bytes)?,
    };

    if decoded.samples.is_empty() {
        return Err(AudioError::Empty);
    }

    info!(
        "Loaded audio: {:.2}s at {} Hz, {} channel(s)",
        decoded.duration_secs(),
        decoded.sample_rate,
        decoded.channels
    );

    let samples = resample_to_target(&decoded.samples, decoded.sample_rate)?;
    Ok(Arc::from(samples))
}
