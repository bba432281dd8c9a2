use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

const APP_DIR: &str = "TaskRecorder";

/// TOML-based configuration store with OS-specific paths.
pub struct TomlConfigStore {
    config_dir: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
}

impl TomlConfigStore {
    /// Create a store rooted in the OS application directories.
    /// - config: `dirs::config_dir()/TaskRecorder`
    /// - data: `dirs::data_dir()/TaskRecorder`
    /// - cache: `dirs::cache_dir()/TaskRecorder`
    pub fn new() -> Result<Self, DomainError> {
        let config_dir = Self::app_dir(dirs::config_dir(), "configuration")?;
        let data_dir = Self::app_dir(dirs::data_dir(), "application data")?;
        let cache_dir = dirs::cache_dir()
            .map(|p| p.join(APP_DIR))
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR));

        Self::with_dirs(config_dir, data_dir, cache_dir)
    }

    /// Create a store with explicit directories.
    pub fn with_dirs(
        config_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self, DomainError> {
        let store = Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
            cache_dir: cache_dir.into(),
        };

        fs::create_dir_all(&store.config_dir)?;

        info!(
            config_dir = ?store.config_dir,
            data_dir = ?store.data_dir,
            "ConfigStore initialized"
        );
        Ok(store)
    }

    fn app_dir(base: Option<PathBuf>, what: &str) -> Result<PathBuf, DomainError> {
        base.map(|p| p.join(APP_DIR))
            .ok_or_else(|| DomainError::Config(format!("Could not find {what} directory")))
    }

    fn read_config(path: &Path) -> Result<AppConfig, DomainError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading configuration");
            let config = Self::read_config(&config_path)?;
            info!(path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(path = ?config_path, "Configuration file not found, creating default");
            let config = AppConfig::new();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        let config_path = self.config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&config_path, content)?;

        info!(path = ?config_path, "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
