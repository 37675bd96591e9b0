// linkshelf Settings Engine
// Loads, saves, and updates the runtime configuration.
// Settings are stored as a JSON file, by default under LINKSHELF_DATA_DIR.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::errors::SettingsError;
use crate::types::settings::SyncSettings;

/// Environment variable naming the directory that holds config and data files.
pub const DATA_DIR_ENV: &str = "LINKSHELF_DATA_DIR";

const CONFIG_FILE_NAME: &str = "linkshelf.json";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<SyncSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &SyncSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: SyncSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise the file lives in [`data_dir`].
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = match path_override {
            Some(p) => p,
            None => data_dir()
                .join(CONFIG_FILE_NAME)
                .to_string_lossy()
                .to_string(),
        };

        Self {
            config_path,
            settings: SyncSettings::default(),
        }
    }
}

/// Directory named by `LINKSHELF_DATA_DIR`, or the working directory.
pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Rejects settings the runtime cannot work with.
pub fn validate(settings: &SyncSettings) -> Result<(), SettingsError> {
    if settings.feed.capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "feed.capacity must be greater than zero".to_string(),
        ));
    }
    if settings.view.command_buffer == 0 {
        return Err(SettingsError::InvalidValue(
            "view.command_buffer must be greater than zero".to_string(),
        ));
    }
    if settings.storage.database_path.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "storage.database_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// A missing file yields defaults. A malformed file is a serialization
    /// error; a well-formed file with unusable values is an invalid-value error.
    fn load(&mut self) -> Result<SyncSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = SyncSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: SyncSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        validate(&settings)?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Updates an individual setting by dot-notation key path and saves.
    ///
    /// # Examples
    /// - `"feed.capacity"` → updates `settings.feed.capacity`
    /// - `"logging.filter"` → updates `settings.logging.filter`
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let parts: Vec<&str> = key.split('.').collect();

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        {
            let mut current = &mut json_value;
            for (i, part) in parts.iter().enumerate() {
                if i == parts.len() - 1 {
                    match current {
                        serde_json::Value::Object(map) => {
                            if !map.contains_key(*part) {
                                return Err(SettingsError::InvalidKey(format!(
                                    "Key '{}' not found in settings",
                                    key
                                )));
                            }
                            map.insert(part.to_string(), value.clone());
                        }
                        _ => {
                            return Err(SettingsError::InvalidKey(format!(
                                "Cannot navigate to key '{}': intermediate value is not an object",
                                key
                            )));
                        }
                    }
                } else {
                    current = match current.get_mut(*part) {
                        Some(v) => v,
                        None => {
                            return Err(SettingsError::InvalidKey(format!(
                                "Key '{}' not found in settings",
                                key
                            )));
                        }
                    };
                }
            }
        }

        let new_settings: SyncSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        validate(&new_settings)?;

        self.settings = new_settings;
        self.save()?;

        Ok(())
    }

    /// Resets all settings to defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = SyncSettings::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
