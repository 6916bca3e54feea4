use log::warn;
use shared_types::{PlayerSettings, SettingsUpdate};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("io error while handling settings file")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON-backed player settings. Missing or unreadable files fall back to defaults.
pub struct SettingsStore {
    path: PathBuf,
    settings: PlayerSettings,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match load_settings(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                PlayerSettings::default()
            }
            Err(err) => {
                warn!("using default settings, {}: {err}", path.display());
                PlayerSettings::default()
            }
        };
        Self { path, settings }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> PlayerSettings {
        self.settings.clone()
    }

    pub fn set(&mut self, settings: PlayerSettings) -> Result<PlayerSettings, SettingsError> {
        self.settings = settings;
        self.persist()?;
        Ok(self.settings.clone())
    }

    pub fn update(&mut self, update: SettingsUpdate) -> Result<PlayerSettings, SettingsError> {
        self.settings = self.settings.apply_update(update);
        self.persist()?;
        Ok(self.settings.clone())
    }

    fn persist(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&self.settings)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

fn load_settings(path: &Path) -> Result<PlayerSettings, SettingsError> {
    let payload = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&payload)?)
}
