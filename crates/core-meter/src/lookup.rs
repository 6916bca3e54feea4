use shared_types::{MeterSettings, PowerIndexing};

fn db_to_amp(decibels: f32) -> f32 {
    10.0_f32.powf(0.05 * decibels)
}

/// Precomputed decibel to perceptual amplitude mapping.
///
/// Entry `i` holds the response for `i * resolution` dB, so index 0 is 0 dB
/// (full scale) and the last entry is the floor.
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeLookupTable {
    min_decibels: f32,
    scale_factor: f32,
    indexing: PowerIndexing,
    table: Vec<f32>,
}

impl AmplitudeLookupTable {
    pub fn new() -> Self {
        Self::with_settings(&MeterSettings::default())
    }

    pub fn with_settings(settings: &MeterSettings) -> Self {
        let table_size = settings.table_size.max(2);
        let min_decibels = if settings.min_decibels < 0.0 {
            settings.min_decibels
        } else {
            MeterSettings::default().min_decibels
        };
        let root = if settings.response_root > 0.0 {
            settings.response_root
        } else {
            MeterSettings::default().response_root
        };

        let db_resolution = min_decibels / (table_size - 1) as f32;
        let scale_factor = 1.0 / db_resolution;
        let rroot = 1.0 / root;
        let min_amp = db_to_amp(min_decibels);
        let inv_amp_range = 1.0 / (1.0 - min_amp);

        let table = (0..table_size)
            .map(|index| {
                let decibels = index as f32 * db_resolution;
                let adj_amp = ((db_to_amp(decibels) - min_amp) * inv_amp_range).clamp(0.0, 1.0);
                adj_amp.powf(rroot)
            })
            .collect();

        Self {
            min_decibels,
            scale_factor,
            indexing: settings.power_indexing,
            table,
        }
    }

    pub fn min_decibels(&self) -> f32 {
        self.min_decibels
    }

    pub fn entries(&self) -> &[f32] {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Maps a dB value into `[0, 1]`. Anything at or below the floor reads as 0.
    pub fn value_for_power(&self, power: f32) -> f32 {
        if power.is_nan() || power <= self.min_decibels {
            return 0.0;
        }
        if power >= 0.0 {
            return 1.0;
        }

        let index = match self.indexing {
            PowerIndexing::Scaled => (power * self.scale_factor) as usize,
            PowerIndexing::Truncated => {
                let index = (power as i64) * (self.scale_factor as i64);
                index.max(0) as usize
            }
        };
        self.table[index.min(self.table.len() - 1)]
    }
}

impl Default for AmplitudeLookupTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Independent tables for the average and peak readings.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTables {
    pub average: AmplitudeLookupTable,
    pub peak: AmplitudeLookupTable,
}

impl LevelTables {
    pub fn new(settings: &MeterSettings) -> Self {
        Self {
            average: AmplitudeLookupTable::with_settings(settings),
            peak: AmplitudeLookupTable::with_settings(settings),
        }
    }
}

impl Default for LevelTables {
    fn default() -> Self {
        Self::new(&MeterSettings::default())
    }
}
