mod decoder;
mod downsample;
mod loader;

pub use decoder::{AudioDecoder, WavDecoder, WaveformError};
pub use downsample::{channel_samples, downsample, normalize};
pub use loader::{
    load_downsampled, load_samples, load_waveform, WaveformLoadResult, WaveformLoader,
    WaveformRequest,
};
