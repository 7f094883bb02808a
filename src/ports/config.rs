use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Settings store port for persisting and loading app configuration.
///
/// Read on every orchestration decision, written on every user-driven change.
pub trait SettingsStore: Send + Sync {
    /// Load configuration from persistent storage.
    /// Creates default config if none exists.
    fn load(&self) -> Result<AppConfig, DomainError>;

    /// Save configuration to persistent storage.
    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    /// Atomically load, mutate and save the configuration, returning the
    /// saved record. Implementations must serialize concurrent updates so
    /// one writer can never save a snapshot that predates another's write.
    fn update(
        &self,
        mutate: &mut dyn FnMut(&mut AppConfig),
    ) -> Result<AppConfig, DomainError>;

    /// Get the path to the configuration file.
    fn config_path(&self) -> PathBuf;

    /// Get the path to the application data directory.
    fn data_dir(&self) -> PathBuf;

    /// Get the path to the logs directory.
    fn logs_dir(&self) -> PathBuf;
}
