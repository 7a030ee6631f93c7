//! Storage layer for cursor settings
//!
//! Reads the user's `settings.toml` when present, otherwise the bundled
//! defaults. Writes go through a temporary file and a rename so a crash never
//! leaves a half-written file behind.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::schema::CursorSettings;
use super::validation::SettingsValidation;
use crate::error::SettingsError;

pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Defaults shipped with the library
pub const BUNDLED_SETTINGS: &str = include_str!("../../assets/settings.toml");

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the settings file
    pub base_directory: PathBuf,
    pub file_name: String,
    /// Write through a temporary file and rename
    pub atomic_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_directory: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".xreal")
                .join("cursor3d"),
            file_name: SETTINGS_FILE_NAME.to_string(),
            atomic_writes: true,
        }
    }
}

impl StorageConfig {
    pub fn in_directory(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStorage {
    config: StorageConfig,
}

/// Parse and validate settings text
pub fn parse_settings(text: &str) -> Result<CursorSettings, SettingsError> {
    let settings: CursorSettings = toml::from_str(text)?;
    settings
        .validate()
        .map_err(|e| SettingsError::Validation(e.to_string()))?;
    Ok(settings)
}

fn encode_settings(settings: &CursorSettings) -> Result<String, SettingsError> {
    settings
        .validate()
        .map_err(|e| SettingsError::Validation(e.to_string()))?;
    Ok(toml::to_string_pretty(settings)?)
}

impl SettingsStorage {
    /// Create settings storage with the default configuration
    pub fn new() -> Result<Self, SettingsError> {
        Self::with_config(StorageConfig::default())
    }

    /// Create settings storage, creating the base directory if needed
    pub fn with_config(config: StorageConfig) -> Result<Self, SettingsError> {
        std::fs::create_dir_all(&config.base_directory)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config.base_directory.join(&self.config.file_name)
    }

    /// True when the user has saved settings before
    pub fn exists(&self) -> bool {
        self.settings_path().exists()
    }

    pub fn load_bundled() -> Result<CursorSettings, SettingsError> {
        parse_settings(BUNDLED_SETTINGS)
    }

    /// User settings if present, else the bundled defaults
    pub fn load(&self) -> Result<CursorSettings, SettingsError> {
        let path = self.settings_path();
        if !path.exists() {
            debug!("No settings at {:?}, using bundled defaults", path);
            return Self::load_bundled();
        }
        let text = std::fs::read_to_string(&path)?;
        let settings = parse_settings(&text)?;
        info!("✅ Cursor settings loaded from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, settings: &CursorSettings) -> Result<(), SettingsError> {
        let text = encode_settings(settings)?;
        let path = self.settings_path();
        if self.config.atomic_writes {
            let tmp = tmp_path(&path);
            std::fs::write(&tmp, text.as_bytes())?;
            std::fs::rename(&tmp, &path)?;
        } else {
            std::fs::write(&path, text.as_bytes())?;
        }
        info!("✅ Cursor settings saved to {:?}", path);
        Ok(())
    }

    /// Async variant of [`load`](Self::load)
    pub async fn load_async(&self) -> Result<CursorSettings, SettingsError> {
        let path = self.settings_path();
        if !fs::try_exists(&path).await? {
            return Self::load_bundled();
        }
        let text = fs::read_to_string(&path).await?;
        parse_settings(&text)
    }

    /// Async variant of [`save`](Self::save)
    pub async fn save_async(&self, settings: &CursorSettings) -> Result<(), SettingsError> {
        let text = encode_settings(settings)?;
        let path = self.settings_path();
        if self.config.atomic_writes {
            let tmp = tmp_path(&path);
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(text.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &path).await?;
        } else {
            fs::write(&path, text.as_bytes()).await?;
        }
        info!("✅ Cursor settings saved to {:?}", path);
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}
