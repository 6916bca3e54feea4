use crate::lookup::LevelTables;
use crate::meter::{LevelHandle, LevelMeter};
use crate::pcm::PcmBuffer;
use crate::transport::{TransportError, TransportMachine};
use log::{debug, info};
use shared_types::{
    default_playback_rates, AudioTime, DecodedAudio, NormalizedLevels, PlaybackRate,
    PlayerSettings, TransportEvent, TransportState,
};
use std::sync::Arc;

pub type BufferCallback = Box<dyn FnMut(&PcmBuffer<'_>) + Send>;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("audio backend error: {0}")]
    Backend(String),
    #[error("no output devices available")]
    NoOutputDevice,
    #[error("audio has no channels or sample rate")]
    InvalidFormat,
    #[error("no audio is loaded")]
    NotLoaded,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Transport commands accepted by a running output.
///
/// Frame positions are absolute frames of the loaded audio.
pub trait PlaybackOutput {
    fn play(&self) -> Result<(), PlaybackError>;
    fn pause(&self) -> Result<(), PlaybackError>;
    fn stop(&self) -> Result<(), PlaybackError>;
    fn schedule_file(&self) -> Result<(), PlaybackError>;
    fn schedule_segment(&self, start_frame: u64, frame_count: u64) -> Result<(), PlaybackError>;
    fn set_rate(&self, rate: f32) -> Result<(), PlaybackError>;
    fn current_frame(&self) -> u64;
}

pub trait PlaybackBackend: 'static {
    type Output: PlaybackOutput;

    /// Opens an output for `audio`. `on_buffer` runs once per rendered buffer
    /// on the audio thread and receives an empty buffer while nothing plays.
    fn build_output(
        &self,
        audio: Arc<DecodedAudio>,
        on_buffer: BufferCallback,
    ) -> Result<Self::Output, PlaybackError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackProgress {
    pub position: u64,
    pub progress: f64,
    pub time: AudioTime,
}

pub struct PlaybackService<B: PlaybackBackend> {
    backend: B,
    output: Option<B::Output>,
    transport: TransportMachine,
    tables: Arc<LevelTables>,
    levels: Option<LevelHandle>,
    rates: Vec<PlaybackRate>,
    rate_index: usize,
    length_frames: u64,
    sample_rate: u32,
    position: u64,
    was_playing: bool,
}

impl<B: PlaybackBackend> PlaybackService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_settings(backend, &PlayerSettings::default())
    }

    pub fn with_settings(backend: B, settings: &PlayerSettings) -> Self {
        let rates = if settings.playback_rates.is_empty() {
            default_playback_rates()
        } else {
            settings.playback_rates.clone()
        };
        Self {
            backend,
            output: None,
            transport: TransportMachine::new(),
            tables: Arc::new(LevelTables::new(&settings.meter)),
            levels: None,
            rates,
            rate_index: 0,
            length_frames: 0,
            sample_rate: 0,
            position: 0,
            was_playing: false,
        }
    }

    pub fn load(&mut self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        if audio.channels == 0 || audio.sample_rate == 0 {
            return Err(PlaybackError::InvalidFormat);
        }
        if let Some(previous) = self.output.take() {
            previous.stop()?;
        }

        let mut meter = LevelMeter::with_tables(Arc::clone(&self.tables));
        let handle = meter.handle();
        self.length_frames = audio.frame_count() as u64;
        self.sample_rate = audio.sample_rate;
        self.position = 0;
        self.was_playing = false;

        let output = self.backend.build_output(
            Arc::new(audio),
            Box::new(move |buffer: &PcmBuffer<'_>| meter.process(buffer)),
        )?;
        output.set_rate(self.playback_rate().value)?;
        output.schedule_file()?;

        self.transport.apply(TransportEvent::Reset)?;
        self.transport.apply(TransportEvent::Schedule)?;
        self.output = Some(output);
        self.levels = Some(handle);
        info!(
            "loaded {} frames at {} Hz",
            self.length_frames, self.sample_rate
        );
        Ok(())
    }

    pub fn state(&self) -> TransportState {
        self.transport.current()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.current() == TransportState::Playing
    }

    pub fn length_frames(&self) -> u64 {
        self.length_frames
    }

    pub fn length_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length_frames as f64 / self.sample_rate as f64
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        let output = self.output.as_ref().ok_or(PlaybackError::NotLoaded)?;
        match self.transport.current() {
            TransportState::Playing => return Ok(()),
            TransportState::Idle => {
                output.schedule_file()?;
                self.position = 0;
                self.transport.apply(TransportEvent::Schedule)?;
            }
            _ => {
                self.transport.next_state(TransportEvent::Play)?;
            }
        }
        output.play()?;
        self.transport.apply(TransportEvent::Play)?;
        debug!("playback started at frame {}", self.position);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        let output = self.output.as_ref().ok_or(PlaybackError::NotLoaded)?;
        if self.transport.current() != TransportState::Playing {
            return Ok(());
        }
        self.transport.next_state(TransportEvent::Pause)?;
        output.pause()?;
        self.transport.apply(TransportEvent::Pause)?;
        debug!("playback paused");
        Ok(())
    }

    pub fn play_or_pause(&mut self) -> Result<(), PlaybackError> {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        let output = self.output.as_ref().ok_or(PlaybackError::NotLoaded)?;
        if self.transport.current() == TransportState::Idle {
            return Ok(());
        }
        self.transport.next_state(TransportEvent::Stop)?;
        output.stop()?;
        self.transport.apply(TransportEvent::Stop)?;
        self.position = 0;
        self.was_playing = false;
        if let Some(levels) = self.levels.as_ref() {
            levels.reset();
        }
        debug!("playback stopped");
        Ok(())
    }

    pub fn seek_begin(&mut self) -> Result<(), PlaybackError> {
        let output = self.output.as_ref().ok_or(PlaybackError::NotLoaded)?;
        if self.transport.current() == TransportState::Seeking {
            return Ok(());
        }
        self.transport.next_state(TransportEvent::BeginSeek)?;
        self.was_playing = self.transport.current() == TransportState::Playing;
        output.stop()?;
        self.transport.apply(TransportEvent::BeginSeek)?;
        Ok(())
    }

    /// Moves the playhead to `fraction` of the audio length and schedules the
    /// remainder. Playback resumes if it was running when the seek began.
    pub fn seek_to_position(&mut self, fraction: f64) -> Result<PlaybackProgress, PlaybackError> {
        self.seek_begin()?;
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let frame = ((fraction * self.length_frames as f64) as u64).min(self.length_frames);
        let output = self.output.as_ref().ok_or(PlaybackError::NotLoaded)?;

        let resume = if frame < self.length_frames {
            debug!(
                "scheduling segment at frame {frame}, {} frames",
                self.length_frames - frame
            );
            output.schedule_segment(frame, self.length_frames - frame)?;
            self.position = frame;
            self.was_playing
        } else {
            output.schedule_file()?;
            self.position = 0;
            false
        };

        self.transport.apply(TransportEvent::EndSeek { resume })?;
        if resume {
            output.play()?;
        }
        self.was_playing = false;
        Ok(self.progress_at(self.position))
    }

    /// Time readout for a drag gesture that has not been committed yet.
    pub fn preview_time(&self, fraction: f64) -> AudioTime {
        let length = self.length_secs();
        AudioTime::new(fraction.clamp(0.0, 1.0) * length, length)
    }

    pub fn playback_rate(&self) -> &PlaybackRate {
        &self.rates[self.rate_index]
    }

    pub fn cycle_playback_rate(&mut self) -> Result<&PlaybackRate, PlaybackError> {
        self.rate_index = (self.rate_index + 1) % self.rates.len();
        let rate = self.rates[self.rate_index].value;
        if let Some(output) = self.output.as_ref() {
            output.set_rate(rate)?;
        }
        debug!("playback rate set to {rate}");
        Ok(&self.rates[self.rate_index])
    }

    /// Polls the output position. Reaching the end stops playback and rewinds.
    pub fn update_progress(&mut self) -> Result<PlaybackProgress, PlaybackError> {
        let output = self.output.as_ref().ok_or(PlaybackError::NotLoaded)?;
        let state = self.transport.current();
        if matches!(state, TransportState::Playing | TransportState::Paused) {
            self.position = output.current_frame().min(self.length_frames);
        }

        if state == TransportState::Playing && self.position >= self.length_frames {
            output.stop()?;
            self.transport.apply(TransportEvent::Finish)?;
            self.position = 0;
            if let Some(levels) = self.levels.as_ref() {
                levels.reset();
            }
            info!("playback finished");
        }
        Ok(self.progress_at(self.position))
    }

    fn progress_at(&self, position: u64) -> PlaybackProgress {
        let progress = if self.length_frames == 0 {
            0.0
        } else {
            position as f64 / self.length_frames as f64
        };
        let elapsed = if self.sample_rate == 0 {
            0.0
        } else {
            position as f64 / self.sample_rate as f64
        };
        PlaybackProgress {
            position,
            progress,
            time: AudioTime::new(elapsed, self.length_secs()),
        }
    }

    /// Number of waveform bars that fall behind the playhead.
    pub fn active_samples_count(&self, total_bars: usize) -> usize {
        (self.progress_at(self.position).progress * total_bars as f64) as usize
    }

    pub fn levels(&self) -> NormalizedLevels {
        self.levels
            .as_ref()
            .map(LevelHandle::levels)
            .unwrap_or_default()
    }

    pub fn level_handle(&self) -> Option<LevelHandle> {
        self.levels.clone()
    }
}
