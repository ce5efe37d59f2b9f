use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use crate::error::AudioError;

/// Sample rate both speech models expect
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Chunked resampler from a source rate to 16kHz
pub struct AudioResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    input_frames: usize,
}

impl AudioResampler {
    pub fn new(source_sample_rate: u32) -> Result<Self, AudioError> {
        let ratio = TARGET_SAMPLE_RATE as f64 / source_sample_rate as f64;

        debug!(
            "Creating resampler: {} Hz -> {} Hz (ratio: {:.4})",
            source_sample_rate, TARGET_SAMPLE_RATE, ratio
        );

        let input_frames = 1024;
        let channels = 1; // Mono

        let resampler = FftFixedIn::new(
            source_sample_rate as usize,
            TARGET_SAMPLE_RATE as usize,
            input_frames,
            2, // sub_chunks for quality
            channels,
        )
        .map_err(|e| AudioError::Resample(e.to_string()))?;

        let input_buffer = vec![vec![0.0f32; input_frames]; channels];
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_frames,
        })
    }

    /// Get the number of input frames needed for the next process call
    pub fn input_frames_next(&self) -> usize {
        self.input_frames
    }

    /// Output samples of latency introduced by the FFT resampler
    pub fn output_delay(&self) -> usize {
        self.resampler.output_delay()
    }

    /// Process exactly `input_frames_next()` samples
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, AudioError> {
        if input.len() != self.input_frames {
            return Err(AudioError::Resample(format!(
                "Input length {} doesn't match expected {}",
                input.len(),
                self.input_frames
            )));
        }

        self.input_buffer[0].copy_from_slice(input);

        let (_, output_frames) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

        Ok(self.output_buffer[0][..output_frames].to_vec())
    }
}

/// Resample a whole mono buffer to 16kHz.
///
/// The last chunk is zero-padded; the resampler delay is trimmed so the output
/// lines up with the input and has the expected length.
pub fn resample_to_target(samples: &[f32], source_sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    if source_sample_rate == TARGET_SAMPLE_RATE {
        return Ok(samples.to_vec());
    }
    if source_sample_rate == 0 {
        return Err(AudioError::Resample("Source sample rate is zero".to_string()));
    }

    let mut resampler = AudioResampler::new(source_sample_rate)?;
    let chunk_len = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * TARGET_SAMPLE_RATE as f64 / source_sample_rate as f64)
        .round() as usize;

    let mut output = Vec::with_capacity(expected + delay);
    let mut chunk = vec![0.0f32; chunk_len];

    for block in samples.chunks(chunk_len) {
        chunk[..block.len()].copy_from_slice(block);
        chunk[block.len()..].fill(0.0);
        output.extend(resampler.process(&chunk)?);
    }

    // Flush the delay line
    chunk.fill(0.0);
    while output.len() < expected + delay {
        output.extend(resampler.process(&chunk)?);
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
