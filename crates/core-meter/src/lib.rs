mod logging;
mod lookup;
mod meter;
mod output;
mod pcm;
mod playback;
mod settings;
mod transport;
mod visualizer;

pub use logging::{init_logging, logger, LogEntry, MemoryLogger};
pub use lookup::{AmplitudeLookupTable, LevelTables};
pub use meter::{LevelCell, LevelHandle, LevelMeter, PowerReading, MIN_LEVEL};
pub use output::{CpalPlaybackBackend, CpalPlaybackOutput};
pub use pcm::{PcmBuffer, PcmLayout, SampleData};
pub use playback::{
    BufferCallback, PlaybackBackend, PlaybackError, PlaybackOutput, PlaybackProgress,
    PlaybackService,
};
pub use settings::{SettingsError, SettingsStore};
pub use transport::{TransportError, TransportMachine};
pub use visualizer::AmplitudeAnimator;
