use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Configuration store port for persisting and loading app configuration.
pub trait ConfigStore: Send + Sync {
    /// Load configuration from persistent storage.
    /// Creates default config if none exists.
    fn load(&self) -> Result<AppConfig, DomainError>;

    /// Save configuration to persistent storage.
    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    /// App-private persistent directory holding `Recordings` and `Photos`.
    fn data_dir(&self) -> PathBuf;

    /// App-private cache directory for provisional clips.
    fn cache_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;
}
