use crate::lookup::LevelTables;
use crate::pcm::{i16_to_f32, i32_to_f32, PcmBuffer, SampleData};
use shared_types::NormalizedLevels;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Floor applied to peak and RMS before the dB conversion (-160 dB).
pub const MIN_LEVEL: f32 = 0.000_000_01;

const EMPTY_SLOT: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub average: f32,
    pub peak: f32,
}

impl PowerReading {
    fn from_linear(rms: f32, peak: f32) -> Self {
        Self {
            average: 20.0 * rms.max(MIN_LEVEL).log10(),
            peak: 20.0 * peak.max(MIN_LEVEL).log10(),
        }
    }

    fn pack(self) -> u64 {
        ((self.average.to_bits() as u64) << 32) | self.peak.to_bits() as u64
    }

    fn unpack(bits: u64) -> Self {
        Self {
            average: f32::from_bits((bits >> 32) as u32),
            peak: f32::from_bits(bits as u32),
        }
    }
}

fn channel_power<T: Copy>(
    samples: &[T],
    offset: usize,
    stride: usize,
    frames: usize,
    convert: impl Fn(T) -> f32,
) -> PowerReading {
    let mut peak = 0.0_f32;
    let mut sum = 0.0_f32;
    let mut count = 0usize;

    for &raw in samples.iter().skip(offset).step_by(stride.max(1)).take(frames) {
        let sample = convert(raw);
        let magnitude = sample.abs();
        if magnitude > peak {
            peak = magnitude;
        }
        sum += sample * sample;
        count += 1;
    }

    let rms = if count == 0 {
        0.0
    } else {
        (sum / count as f32).sqrt()
    };
    PowerReading::from_linear(rms, peak)
}

fn levels_for(tables: &LevelTables, reading: Option<PowerReading>) -> NormalizedLevels {
    match reading {
        Some(reading) => NormalizedLevels {
            level: tables.average.value_for_power(reading.average),
            peak_level: tables.peak.value_for_power(reading.peak),
        },
        None => NormalizedLevels::silence(),
    }
}

/// Single-slot, overwrite-on-write cell carrying the newest channel 0 reading.
#[derive(Debug)]
pub struct LevelCell {
    slot: AtomicU64,
}

impl LevelCell {
    pub fn new() -> Self {
        Self {
            slot: AtomicU64::new(EMPTY_SLOT),
        }
    }

    pub fn store(&self, reading: PowerReading) {
        self.slot.store(reading.pack(), Ordering::Release);
    }

    pub fn clear(&self) {
        self.slot.store(EMPTY_SLOT, Ordering::Release);
    }

    pub fn load(&self) -> Option<PowerReading> {
        match self.slot.load(Ordering::Acquire) {
            EMPTY_SLOT => None,
            bits => Some(PowerReading::unpack(bits)),
        }
    }
}

impl Default for LevelCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a [`LevelMeter`], safe to poll from any thread.
#[derive(Debug, Clone)]
pub struct LevelHandle {
    cell: Arc<LevelCell>,
    tables: Arc<LevelTables>,
}

impl LevelHandle {
    pub fn reading(&self) -> Option<PowerReading> {
        self.cell.load()
    }

    pub fn levels(&self) -> NormalizedLevels {
        levels_for(&self.tables, self.cell.load())
    }

    pub fn reset(&self) {
        self.cell.clear();
    }
}

/// Per-buffer peak/RMS meter. Owned by the audio thread.
#[derive(Debug)]
pub struct LevelMeter {
    tables: Arc<LevelTables>,
    readings: Vec<PowerReading>,
    cell: Arc<LevelCell>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::with_tables(Arc::new(LevelTables::default()))
    }

    pub fn with_tables(tables: Arc<LevelTables>) -> Self {
        Self {
            tables,
            readings: Vec::with_capacity(8),
            cell: Arc::new(LevelCell::new()),
        }
    }

    pub fn handle(&self) -> LevelHandle {
        LevelHandle {
            cell: Arc::clone(&self.cell),
            tables: Arc::clone(&self.tables),
        }
    }

    pub fn process(&mut self, buffer: &PcmBuffer<'_>) {
        if buffer.is_silent_shape() {
            self.process_silence();
            return;
        }

        let frames = buffer.frame_length();
        let stride = buffer.stride();
        self.readings.clear();
        for channel in 0..buffer.channel_count() {
            let offset = buffer.channel_offset(channel);
            let reading = match buffer.data() {
                SampleData::F32(samples) => {
                    channel_power(samples, offset, stride, frames, |value| value)
                }
                SampleData::I16(samples) => {
                    channel_power(samples, offset, stride, frames, i16_to_f32)
                }
                SampleData::I32(samples) => {
                    channel_power(samples, offset, stride, frames, i32_to_f32)
                }
            };
            self.readings.push(reading);
        }

        if let Some(first) = self.readings.first() {
            self.cell.store(*first);
        }
    }

    pub fn process_silence(&mut self) {
        if self.readings.is_empty() {
            return;
        }
        self.readings.clear();
        self.cell.clear();
    }

    pub fn readings(&self) -> &[PowerReading] {
        &self.readings
    }

    pub fn levels(&self) -> NormalizedLevels {
        levels_for(&self.tables, self.readings.first().copied())
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}
