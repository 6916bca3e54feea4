use crate::pcm::{PcmBuffer, SampleData};
use crate::playback::{BufferCallback, PlaybackBackend, PlaybackError, PlaybackOutput};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use log::{error, info};
use shared_types::DecodedAudio;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

const FRACTION_BITS: u32 = 32;

/// Playhead shared between the transport and the render callback.
///
/// `position` is a 32.32 fixed-point frame index into the loaded audio.
#[derive(Debug)]
struct Playhead {
    position: AtomicU64,
    end_frame: AtomicU64,
    rate_bits: AtomicU32,
    playing: AtomicBool,
    frames: u64,
}

impl Playhead {
    fn new(frames: u64) -> Self {
        Self {
            position: AtomicU64::new(0),
            end_frame: AtomicU64::new(0),
            rate_bits: AtomicU32::new(1.0_f32.to_bits()),
            playing: AtomicBool::new(false),
            frames,
        }
    }

    fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::Release);
        self.end_frame.store(0, Ordering::Release);
        self.position.store(0, Ordering::Release);
    }

    fn schedule(&self, start_frame: u64, frame_count: u64) {
        let start = start_frame.min(self.frames);
        let end = start.saturating_add(frame_count).min(self.frames);
        self.end_frame.store(end, Ordering::Release);
        self.position
            .store(start << FRACTION_BITS, Ordering::Release);
    }

    fn set_rate(&self, rate: f32) {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    fn current_frame(&self) -> u64 {
        self.position.load(Ordering::Acquire) >> FRACTION_BITS
    }
}

/// Writes the next frames of `audio` into `data` and returns how many frames
/// came from the audio. Frames past the scheduled end are silent.
fn render_frames<T>(
    data: &mut [T],
    channels: usize,
    audio: &DecodedAudio,
    playhead: &Playhead,
    step_ratio: f64,
) -> usize
where
    T: Sample + FromSample<f32>,
{
    let source_channels = audio.channels as usize;
    if channels == 0 || source_channels == 0 || !playhead.playing.load(Ordering::Acquire) {
        data.fill(T::EQUILIBRIUM);
        return 0;
    }

    let end = playhead.end_frame.load(Ordering::Acquire);
    let rate = f32::from_bits(playhead.rate_bits.load(Ordering::Relaxed)) as f64;
    let step = (rate * step_ratio * (1u64 << FRACTION_BITS) as f64) as u64;
    let start = playhead.position.load(Ordering::Acquire);
    let mut position = start;
    let mut rendered = 0;

    for frame in data.chunks_mut(channels) {
        let source_frame = position >> FRACTION_BITS;
        if source_frame >= end {
            frame.fill(T::EQUILIBRIUM);
            continue;
        }
        let base = source_frame as usize * source_channels;
        for (channel, sample) in frame.iter_mut().enumerate() {
            let value = audio.samples[base + channel.min(source_channels - 1)];
            *sample = T::from_sample(value);
        }
        position = position.saturating_add(step);
        rendered += 1;
    }

    // A seek that landed mid-callback keeps its position.
    let _ = playhead.position.compare_exchange(
        start,
        position.min(end << FRACTION_BITS),
        Ordering::AcqRel,
        Ordering::Acquire,
    );
    rendered
}

pub struct CpalPlaybackBackend {
    host: cpal::Host,
}

impl Default for CpalPlaybackBackend {
    fn default() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

pub struct CpalPlaybackOutput {
    _stream: cpal::Stream,
    playhead: Arc<Playhead>,
}

impl PlaybackOutput for CpalPlaybackOutput {
    fn play(&self) -> Result<(), PlaybackError> {
        self.playhead.set_playing(true);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        self.playhead.set_playing(false);
        Ok(())
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        self.playhead.stop();
        Ok(())
    }

    fn schedule_file(&self) -> Result<(), PlaybackError> {
        self.playhead.schedule(0, self.playhead.frames);
        Ok(())
    }

    fn schedule_segment(&self, start_frame: u64, frame_count: u64) -> Result<(), PlaybackError> {
        self.playhead.schedule(start_frame, frame_count);
        Ok(())
    }

    fn set_rate(&self, rate: f32) -> Result<(), PlaybackError> {
        self.playhead.set_rate(rate);
        Ok(())
    }

    fn current_frame(&self) -> u64 {
        self.playhead.current_frame()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    audio: Arc<DecodedAudio>,
    playhead: Arc<Playhead>,
    mut on_buffer: BufferCallback,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
    for<'a> SampleData<'a>: From<&'a [T]>,
{
    let channels = config.channels as usize;
    let step_ratio = audio.sample_rate as f64 / config.sample_rate.0 as f64;

    let error_callback = |err: cpal::StreamError| {
        error!("audio output stream error: {err}");
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let rendered = render_frames(data, channels, &audio, &playhead, step_ratio);
                let buffer = if rendered == 0 {
                    PcmBuffer::empty()
                } else {
                    PcmBuffer::interleaved(&data[..rendered * channels], channels)
                };
                on_buffer(&buffer);
            },
            error_callback,
            None,
        )
        .map_err(|err| PlaybackError::Backend(err.to_string()))
}

impl PlaybackBackend for CpalPlaybackBackend {
    type Output = CpalPlaybackOutput;

    fn build_output(
        &self,
        audio: Arc<DecodedAudio>,
        on_buffer: BufferCallback,
    ) -> Result<Self::Output, PlaybackError> {
        let device = self
            .host
            .default_output_device()
            .ok_or(PlaybackError::NoOutputDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|err| PlaybackError::Backend(err.to_string()))?;
        let config: cpal::StreamConfig = supported.config();
        let playhead = Arc::new(Playhead::new(audio.frame_count() as u64));

        info!(
            "opening output: {} channels at {} Hz ({:?})",
            config.channels,
            config.sample_rate.0,
            supported.sample_format()
        );

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(
                &device,
                &config,
                audio,
                Arc::clone(&playhead),
                on_buffer,
            )?,
            cpal::SampleFormat::I16 => build_stream::<i16>(
                &device,
                &config,
                audio,
                Arc::clone(&playhead),
                on_buffer,
            )?,
            cpal::SampleFormat::I32 => build_stream::<i32>(
                &device,
                &config,
                audio,
                Arc::clone(&playhead),
                on_buffer,
            )?,
            other => {
                return Err(PlaybackError::Backend(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        };
        stream
            .play()
            .map_err(|err| PlaybackError::Backend(err.to_string()))?;

        Ok(CpalPlaybackOutput {
            _stream: stream,
            playhead,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{render_frames, Playhead};
    use shared_types::DecodedAudio;

    fn ramp(frames: usize) -> DecodedAudio {
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        DecodedAudio::new(48_000, 1, samples)
    }

    #[test]
    fn idle_playhead_renders_silence() {
        let audio = ramp(16);
        let playhead = Playhead::new(16);
        playhead.schedule(0, 16);
        let mut data = [1.0_f32; 8];

        let rendered = render_frames(&mut data, 2, &audio, &playhead, 1.0);
        assert_eq!(rendered, 0);
        assert!(data.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn playing_playhead_copies_frames_to_every_channel() {
        let audio = ramp(16);
        let playhead = Playhead::new(16);
        playhead.schedule(0, 16);
        playhead.set_playing(true);
        let mut data = [0.0_f32; 8];

        let rendered = render_frames(&mut data, 2, &audio, &playhead, 1.0);
        assert_eq!(rendered, 4);
        assert_eq!(data, [0.0, 0.0, 0.0625, 0.0625, 0.125, 0.125, 0.1875, 0.1875]);
        assert_eq!(playhead.current_frame(), 4);
    }

    #[test]
    fn segment_end_pads_with_silence() {
        let audio = ramp(16);
        let playhead = Playhead::new(16);
        playhead.schedule(14, 100);
        playhead.set_playing(true);
        let mut data = [9_i16; 4];

        let rendered = render_frames(&mut data, 1, &audio, &playhead, 1.0);
        assert_eq!(rendered, 2);
        assert_eq!(&data[2..], &[0, 0]);
        assert_eq!(playhead.current_frame(), 16);
    }

    #[test]
    fn rate_advances_playhead_faster() {
        let audio = ramp(16);
        let playhead = Playhead::new(16);
        playhead.schedule(0, 16);
        playhead.set_rate(2.0);
        playhead.set_playing(true);
        let mut data = [0.0_f32; 4];

        render_frames(&mut data, 1, &audio, &playhead, 1.0);
        assert_eq!(data, [0.0, 0.125, 0.25, 0.375]);
        assert_eq!(playhead.current_frame(), 8);
    }

    #[test]
    fn stop_clears_schedule() {
        let playhead = Playhead::new(16);
        playhead.schedule(4, 8);
        playhead.set_playing(true);
        playhead.stop();
        assert_eq!(playhead.current_frame(), 0);

        let audio = ramp(16);
        let mut data = [0.5_f32; 2];
        assert_eq!(render_frames(&mut data, 1, &audio, &playhead, 1.0), 0);
    }
}
