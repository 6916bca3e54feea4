use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    sync::{Mutex, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub level: String,
    pub target: String,
    pub message: String,
    pub timestamp_ms: u128,
}

impl LogEntry {
    fn new(level: log::Level, target: &str, message: String) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        Self {
            level: level.to_string(),
            target: target.to_string(),
            message,
            timestamp_ms,
        }
    }
}

struct LogStore {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogStore {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Bounded in-memory log sink so a host UI can show recent player activity.
pub struct MemoryLogger {
    store: Mutex<LogStore>,
    level: log::LevelFilter,
}

impl MemoryLogger {
    fn new(capacity: usize, level: log::LevelFilter) -> Self {
        Self {
            store: Mutex::new(LogStore::new(capacity)),
            level,
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.store
            .lock()
            .map(|store| store.entries())
            .unwrap_or_default()
    }

    fn push_entry(&self, entry: LogEntry) {
        if let Ok(mut store) = self.store.lock() {
            store.push(entry);
        }
    }
}

impl log::Log for MemoryLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        self.push_entry(LogEntry::new(
            record.level(),
            record.target(),
            format!("{}", record.args()),
        ));
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<&'static MemoryLogger> = OnceLock::new();

/// Installs the memory logger as the global `log` sink. Later calls are no-ops,
/// as is installing when another logger already owns the facade.
pub fn init_logging(capacity: usize, level: log::LevelFilter) -> &'static MemoryLogger {
    LOGGER.get_or_init(|| {
        let logger: &'static MemoryLogger = Box::leak(Box::new(MemoryLogger::new(capacity, level)));
        if log::set_logger(logger).is_ok() {
            log::set_max_level(level);
        }
        logger
    })
}

pub fn logger() -> Option<&'static MemoryLogger> {
    LOGGER.get().copied()
}
