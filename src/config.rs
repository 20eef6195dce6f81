use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Key under which the endpoint is stored.
pub const ENDPOINT_KEY: &str = "healthcareApiUrl";

const APP_DIR_NAME: &str = "Healthcare File Uploader";
const SETTINGS_FILE: &str = "settings.json";

/// Storage for the last-entered endpoint.
pub trait PersistentConfig: Send + Sync {
    fn load(&self) -> AppResult<Option<String>>;
    fn save(&self, value: &str) -> AppResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(rename = "healthcareApiUrl", default, skip_serializing_if = "Option::is_none")]
    healthcare_api_url: Option<String>,
}

/// JSON settings file on disk, one object with the endpoint under [`ENDPOINT_KEY`].
#[derive(Debug, Clone)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Settings file in the user's config directory.
    pub fn in_config_dir() -> AppResult<Self> {
        Ok(Self::new(get_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_settings(&self) -> AppResult<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let settings_str = fs::read_to_string(&self.path)?;
        let settings = serde_json::from_str(&settings_str).unwrap_or_else(|e| {
            log::warn!(
                "Failed to parse settings file {}: {}. Ignoring it.",
                self.path.display(),
                e
            );
            Settings::default()
        });
        Ok(settings)
    }
}

impl PersistentConfig for JsonFileConfig {
    fn load(&self) -> AppResult<Option<String>> {
        Ok(self.read_settings()?.healthcare_api_url)
    }

    fn save(&self, value: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Keep the previous file around
        if self.path.exists() {
            let backup_path = self.path.with_extension("json.bak");
            if let Err(e) = fs::copy(&self.path, &backup_path) {
                log::warn!("Failed to create settings backup: {}", e);
            }
        }

        let mut settings = self.read_settings()?;
        settings.healthcare_api_url = Some(value.to_string());

        let settings_str = serde_json::to_string_pretty(&settings)?;
        fs::write(&self.path, settings_str)?;

        log::debug!("Saved {} to {}", ENDPOINT_KEY, self.path.display());
        Ok(())
    }
}

/// Process-local store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    value: Mutex<Option<String>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &str) -> Self {
        Self {
            value: Mutex::new(Some(value.to_string())),
        }
    }
}

impl PersistentConfig for MemoryConfig {
    fn load(&self) -> AppResult<Option<String>> {
        self.value
            .lock()
            .map(|v| v.clone())
            .map_err(|e| AppError::Config(format!("settings lock poisoned: {}", e)))
    }

    fn save(&self, value: &str) -> AppResult<()> {
        let mut stored = self
            .value
            .lock()
            .map_err(|e| AppError::Config(format!("settings lock poisoned: {}", e)))?;
        *stored = Some(value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Used when nothing has been stored yet.
    pub default_endpoint: String,
    /// How long the progress indicator stays up after a run ends.
    pub progress_hide_delay: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            default_endpoint: String::new(),
            progress_hide_delay: Duration::from_millis(1000),
        }
    }
}

fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join(APP_DIR_NAME);

    Ok(config_dir.join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonFileConfig::new(dir.path().join("settings.json"));
        assert_eq!(config.load().unwrap(), None);
    }

    #[test]
    fn test_save_writes_endpoint_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let config = JsonFileConfig::new(&path);

        config.save("https://api.example.com/upload").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[ENDPOINT_KEY], "https://api.example.com/upload");
    }

    #[test]
    fn test_overwrite_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let config = JsonFileConfig::new(&path);

        config.save("https://first").unwrap();
        config.save("https://second").unwrap();

        assert_eq!(config.load().unwrap().as_deref(), Some("https://second"));
        let backup = fs::read_to_string(path.with_extension("json.bak")).unwrap();
        assert!(backup.contains("https://first"));
    }

    #[test]
    fn test_corrupt_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ this is not json").unwrap();

        let config = JsonFileConfig::new(&path);
        assert_eq!(config.load().unwrap(), None);
    }

    #[test]
    fn test_memory_config() {
        let config = MemoryConfig::new();
        assert_eq!(config.load().unwrap(), None);
        config.save("https://x").unwrap();
        assert_eq!(config.load().unwrap().as_deref(), Some("https://x"));
    }
}
