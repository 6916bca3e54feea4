use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared_types::{AnimationType, NormalizedLevels, PlayerSettings};
use std::f64::consts::PI;

const RAMP_SCALE: f64 = 1.5;
const RAMP_EXPONENT: f64 = 1.2;

fn ramp_value(level: f64, peak: f64, normalized_index: f64, scaling: f64) -> f64 {
    let amplitude = level * (1.0 - normalized_index) + peak * normalized_index;
    (amplitude * scaling).powf(RAMP_EXPONENT).clamp(0.0, 1.0)
}

fn normalized(index: usize, count: usize) -> f64 {
    index as f64 / count.saturating_sub(1).max(1) as f64
}

/// Mirrors `half` around the center so the result has exactly `count` bars.
fn mirrored(half: Vec<f64>, count: usize) -> Vec<f64> {
    let mut bars = half.clone();
    if count % 2 == 1 {
        bars.push(half.last().copied().unwrap_or_default());
    }
    bars.extend(half.iter().rev());
    bars.truncate(count);
    bars
}

/// Drives a row of visualizer bars from meter levels.
#[derive(Debug)]
pub struct AmplitudeAnimator {
    amplitudes: Vec<f64>,
    animation: AnimationType,
    smoothing: f64,
    rng: StdRng,
}

impl AmplitudeAnimator {
    pub fn new(bars: usize, animation: AnimationType) -> Self {
        Self::with_rng(bars, animation, StdRng::from_entropy())
    }

    /// Bar count, animation and smoothing taken from the player settings.
    pub fn from_settings(settings: &PlayerSettings) -> Self {
        Self::new(settings.visualizer_bars, settings.animation).with_smoothing(settings.smoothing)
    }

    pub fn with_seed(bars: usize, animation: AnimationType, seed: u64) -> Self {
        Self::with_rng(bars, animation, StdRng::seed_from_u64(seed))
    }

    fn with_rng(bars: usize, animation: AnimationType, rng: StdRng) -> Self {
        Self {
            amplitudes: vec![0.0; bars],
            animation,
            smoothing: 0.1,
            rng,
        }
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn animation(&self) -> AnimationType {
        self.animation
    }

    pub fn set_animation(&mut self, animation: AnimationType) {
        self.animation = animation;
    }

    /// Moves every bar toward its target. Bars hold still while the peak is 0.
    pub fn update(&mut self, levels: NormalizedLevels, time_secs: f64) -> &[f64] {
        let peak = levels.peak_level as f64;
        let targets = self.targets(levels.level as f64, peak, time_secs);
        if peak > 0.0 {
            let smoothing = self.smoothing;
            for (current, target) in self.amplitudes.iter_mut().zip(targets) {
                *current = *current * (1.0 - smoothing) + target * smoothing;
            }
        }
        &self.amplitudes
    }

    pub fn reset(&mut self) {
        self.amplitudes.iter_mut().for_each(|value| *value = 0.0);
    }

    pub fn targets(&mut self, level: f64, peak: f64, time_secs: f64) -> Vec<f64> {
        let count = self.amplitudes.len();
        let half = count / 2;

        match self.animation {
            AnimationType::Equal => vec![peak.clamp(0.0, 1.0); count],
            AnimationType::LowToHigh => (0..count)
                .map(|i| {
                    let t = normalized(i, count);
                    ramp_value(level, peak, t, 1.0 + t * RAMP_SCALE)
                })
                .collect(),
            AnimationType::HighToLow => (0..count)
                .map(|i| {
                    let t = normalized(i, count);
                    ramp_value(level, peak, t, 1.0 + (1.0 - t) * RAMP_SCALE)
                })
                .collect(),
            AnimationType::SymmetricMiddleHigh => {
                let bars = (0..half)
                    .map(|i| {
                        let t = normalized(i, half);
                        ramp_value(level, peak, t, 1.0 + t * RAMP_SCALE)
                    })
                    .collect();
                mirrored(bars, count)
            }
            AnimationType::SymmetricMiddleLow => {
                let bars = (0..half)
                    .map(|i| {
                        let t = normalized(i, half);
                        ramp_value(level, peak, t, 1.0 + (1.0 - t) * RAMP_SCALE)
                    })
                    .collect();
                mirrored(bars, count)
            }
            AnimationType::Shuffle => {
                let mut bars: Vec<f64> = (0..count)
                    .map(|i| {
                        let t = normalized(i, count);
                        ramp_value(level, peak, t, 1.0 + t * RAMP_SCALE)
                    })
                    .collect();
                bars.shuffle(&mut self.rng);
                bars
            }
            AnimationType::Bounce => (0..count)
                .map(|i| ((i as f64 + time_secs * 2.0).sin().abs() * peak).clamp(0.0, 1.0))
                .collect(),
            AnimationType::Spiral => {
                let scale = 4.0 * PI + time_secs;
                (0..count)
                    .map(|i| {
                        let wave = ((normalized(i, count) * scale).sin() + 1.0) / 2.0;
                        (wave * peak).clamp(0.0, 1.0)
                    })
                    .collect()
            }
            AnimationType::Heartbeat => (0..count)
                .map(|i| {
                    let phase = normalized(i, count) * 2.0 * PI + time_secs * 4.0;
                    (phase.sin().powi(2) * peak).clamp(0.0, 1.0)
                })
                .collect(),
            AnimationType::RandomPeaks => {
                let ceiling = peak.max(0.0);
                (0..count)
                    .map(|_| {
                        (0..count)
                            .map(|_| self.rng.gen_range(0.0..=ceiling))
                            .fold(0.0_f64, f64::max)
                            .clamp(0.0, 1.0)
                    })
                    .collect()
            }
            AnimationType::Oscillation => {
                let scale = 4.0 * PI + time_secs;
                (0..count)
                    .map(|i| {
                        let wave = ((normalized(i, count) * scale).sin() + 1.0) / 2.0;
                        (wave * peak).clamp(0.0, 1.0)
                    })
                    .collect()
            }
            AnimationType::RisingAndFallingPeaks => {
                let bars = (0..half)
                    .map(|i| (normalized(i, half) * peak).clamp(0.0, 1.0))
                    .collect();
                mirrored(bars, count)
            }
        }
    }
}
