use log::debug;
use shared_types::DecodedAudio;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum WaveformError {
    #[error("audio file not found or not decodable: {0}")]
    AudioFileNotFound(String),
    #[error("decoded audio has no readable channel buffer")]
    BufferRetrieveError,
    #[error("waveform loader is no longer running")]
    LoaderStopped,
}

pub trait AudioDecoder: Send + Sync + 'static {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, WaveformError>;
}

/// Decodes PCM WAV files (8-32 bit integer or 32-bit float) into interleaved `f32`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, WaveformError> {
        let reader = hound::WavReader::open(path)
            .map_err(|err| WaveformError::AudioFileNotFound(format!("{}: {err}", path.display())))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(WaveformError::BufferRetrieveError);
        }

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| WaveformError::BufferRetrieveError)?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| WaveformError::BufferRetrieveError)?
            }
        };

        debug!(
            "decoded {}: {} samples, {} channels at {} Hz",
            path.display(),
            samples.len(),
            spec.channels,
            spec.sample_rate
        );
        Ok(DecodedAudio::new(spec.sample_rate, spec.channels, samples))
    }
}
