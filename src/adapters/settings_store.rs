use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::SettingsStore;

/// TOML-based settings store with OS-specific paths.
///
/// `write_lock` covers the whole read-modify-write cycle in `update` so two
/// components persisting at once cannot clobber each other's sections.
pub struct TomlSettingsStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl TomlSettingsStore {
    /// Create a new TomlSettingsStore.
    /// Uses OS-specific application data directories.
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = Self::get_data_dir()?;
        fs::create_dir_all(&data_dir)?;

        info!(data_dir = ?data_dir, "SettingsStore initialized");

        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Store rooted at an explicit directory. Used by tests and tooling.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the OS-specific application data directory.
    /// - macOS: ~/Library/Application Support/Voxwrite/
    /// - Linux: ~/.config/Voxwrite/
    fn get_data_dir() -> Result<PathBuf, DomainError> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir()
                .map(|p| p.join("Voxwrite"))
                .ok_or_else(|| {
                    DomainError::Config("Could not find application data directory".to_string())
                })
        }

        #[cfg(not(target_os = "macos"))]
        {
            dirs::config_dir()
                .map(|p| p.join("Voxwrite"))
                .ok_or_else(|| {
                    DomainError::Config("Could not find application data directory".to_string())
                })
        }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading settings");
            let content = fs::read_to_string(&config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            info!(path = ?config_path, "Settings file not found, creating default");
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

        debug!(path = ?config_path, "Settings saved");
        Ok(())
    }

    fn update(
        &self,
        mutate: &mut dyn FnMut(&mut AppConfig),
    ) -> Result<AppConfig, DomainError> {
        let _guard = self.write_lock.lock();
        let mut config = self.load()?;
        mutate(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("settings.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
