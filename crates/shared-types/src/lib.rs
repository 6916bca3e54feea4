use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct NormalizedLevels {
    pub level: f32,
    pub peak_level: f32,
}

impl NormalizedLevels {
    pub const fn silence() -> Self {
        Self {
            level: 0.0,
            peak_level: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    #[default]
    Idle,
    Scheduled,
    Playing,
    Paused,
    Seeking,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportEvent {
    Schedule,
    Play,
    Pause,
    Stop,
    BeginSeek,
    EndSeek { resume: bool },
    Finish,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackRate {
    pub value: f32,
    pub label: String,
}

impl PlaybackRate {
    pub fn new(value: f32, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }

    pub fn id(&self) -> String {
        format!("{}-{}", self.label, self.value)
    }
}

pub fn default_playback_rates() -> Vec<PlaybackRate> {
    vec![
        PlaybackRate::new(1.0, "1x"),
        PlaybackRate::new(1.5, "1.5x"),
        PlaybackRate::new(2.0, "2x"),
    ]
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnimationType {
    #[default]
    Equal,
    LowToHigh,
    HighToLow,
    SymmetricMiddleHigh,
    SymmetricMiddleLow,
    Shuffle,
    Bounce,
    Spiral,
    Heartbeat,
    RandomPeaks,
    Oscillation,
    RisingAndFallingPeaks,
}

/// How a decibel value is turned into a lookup table index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PowerIndexing {
    /// `trunc(power * scale)`, clamped to the table bounds.
    #[default]
    Scaled,
    /// `trunc(power) * trunc(scale)`, matching the historical meter output.
    Truncated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MeterSettings {
    pub min_decibels: f32,
    pub table_size: usize,
    pub response_root: f32,
    #[serde(default)]
    pub power_indexing: PowerIndexing,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            min_decibels: -60.0,
            table_size: 300,
            response_root: 2.0,
            power_indexing: PowerIndexing::Scaled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PlayerSettings {
    pub downsample_count: usize,
    pub playback_rates: Vec<PlaybackRate>,
    pub visualizer_bars: usize,
    pub animation: AnimationType,
    pub smoothing: f64,
    pub meter: MeterSettings,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            downsample_count: 20,
            playback_rates: default_playback_rates(),
            visualizer_bars: 10,
            animation: AnimationType::Equal,
            smoothing: 0.1,
            meter: MeterSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub downsample_count: Option<usize>,
    #[serde(default)]
    pub playback_rates: Option<Vec<PlaybackRate>>,
    #[serde(default)]
    pub visualizer_bars: Option<usize>,
    #[serde(default)]
    pub animation: Option<AnimationType>,
    #[serde(default)]
    pub smoothing: Option<f64>,
    #[serde(default)]
    pub meter: Option<MeterSettings>,
}

impl PlayerSettings {
    pub fn apply_update(&self, update: SettingsUpdate) -> Self {
        Self {
            downsample_count: update.downsample_count.unwrap_or(self.downsample_count),
            playback_rates: update
                .playback_rates
                .filter(|rates| !rates.is_empty())
                .unwrap_or_else(|| self.playback_rates.clone()),
            visualizer_bars: update.visualizer_bars.unwrap_or(self.visualizer_bars),
            animation: update.animation.unwrap_or(self.animation),
            smoothing: update
                .smoothing
                .map(|value| value.clamp(0.0, 1.0))
                .unwrap_or(self.smoothing),
            meter: update.meter.unwrap_or(self.meter),
        }
    }
}

const SECS_PER_MIN: u64 = 60;
const SECS_PER_HOUR: u64 = SECS_PER_MIN * 60;

/// Elapsed and total playback time with display strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioTime {
    pub elapsed_time: f64,
    pub audio_length_time: f64,
    pub elapsed_text: String,
    pub audio_length_text: String,
}

impl AudioTime {
    pub fn new(elapsed_time: f64, audio_length_time: f64) -> Self {
        Self {
            elapsed_time,
            audio_length_time,
            elapsed_text: format_time(elapsed_time),
            audio_length_text: format_time(audio_length_time),
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Default for AudioTime {
    fn default() -> Self {
        Self::zero()
    }
}

fn format_time(time: f64) -> String {
    let mut seconds = if time.is_finite() && time > 0.0 {
        time.ceil() as u64
    } else {
        0
    };
    let hours = seconds / SECS_PER_HOUR;
    seconds -= hours * SECS_PER_HOUR;
    let mins = seconds / SECS_PER_MIN;
    seconds -= mins * SECS_PER_MIN;

    if hours > 0 {
        format!("{hours:02}:{mins:02}:{seconds:02}")
    } else {
        format!("{mins:02}:{seconds:02}")
    }
}

/// Fully decoded audio, interleaved `f32` samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AnimationType, AudioTime, DecodedAudio, MeterSettings, PlayerSettings, PowerIndexing,
        SettingsUpdate, TransportEvent,
    };

    #[test]
    fn audio_time_formats_minutes_and_seconds() {
        let time = AudioTime::new(61.2, 125.0);
        assert_eq!(time.elapsed_text, "01:02");
        assert_eq!(time.audio_length_text, "02:05");
    }

    #[test]
    fn audio_time_carries_whole_minutes_and_hours() {
        assert_eq!(AudioTime::new(60.0, 0.0).elapsed_text, "01:00");
        assert_eq!(AudioTime::new(3600.0, 0.0).elapsed_text, "01:00:00");
        assert_eq!(AudioTime::new(3725.0, 0.0).elapsed_text, "01:02:05");
    }

    #[test]
    fn audio_time_zero_renders_empty_clock() {
        let time = AudioTime::zero();
        assert_eq!(time.elapsed_text, "00:00");
        assert_eq!(time.audio_length_text, "00:00");
    }

    #[test]
    fn settings_update_merges_fields() {
        let settings = PlayerSettings::default();
        let update = SettingsUpdate {
            downsample_count: Some(64),
            animation: Some(AnimationType::Spiral),
            smoothing: Some(4.0),
            ..SettingsUpdate::default()
        };

        let merged = settings.apply_update(update);
        assert_eq!(merged.downsample_count, 64);
        assert_eq!(merged.animation, AnimationType::Spiral);
        assert_eq!(merged.smoothing, 1.0);
        assert_eq!(merged.playback_rates, settings.playback_rates);
    }

    #[test]
    fn settings_update_ignores_empty_rate_list() {
        let settings = PlayerSettings::default();
        let update = SettingsUpdate {
            playback_rates: Some(Vec::new()),
            ..SettingsUpdate::default()
        };

        let merged = settings.apply_update(update);
        assert_eq!(merged.playback_rates.len(), 3);
    }

    #[test]
    fn meter_settings_default_power_indexing_when_missing() {
        let json = r#"{"min_decibels":-60.0,"table_size":300,"response_root":2.0}"#;
        let decoded: MeterSettings = serde_json::from_str(json).expect("deserialize meter");
        assert_eq!(decoded.power_indexing, PowerIndexing::Scaled);
        assert_eq!(decoded, MeterSettings::default());
    }

    #[test]
    fn transport_event_serializes_snake_case() {
        let json = serde_json::to_string(&TransportEvent::EndSeek { resume: true })
            .expect("serialize event");
        assert_eq!(json, r#"{"end_seek":{"resume":true}}"#);
    }

    #[test]
    fn decoded_audio_reports_frames_and_duration() {
        let audio = DecodedAudio::new(4, 2, vec![0.0; 16]);
        assert_eq!(audio.frame_count(), 8);
        assert_eq!(audio.duration_secs(), 2.0);
        assert_eq!(DecodedAudio::new(44_100, 0, vec![0.0; 4]).frame_count(), 0);
    }
}
