//! Application settings management

use crate::PathManager;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE: &str = "threadkeep";

/// Environment variables that override the settings file
pub const ENV_DATABASE: &str = "THREADKEEP_DATABASE";
pub const ENV_DATA_DIR: &str = "THREADKEEP_DATA_DIR";
pub const ENV_LOG: &str = "THREADKEEP_LOG";

/// Application settings stored in settings.toml
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logical database holding the four collections
    pub database_name: String,
    /// Root of the filesystem document store
    pub data_dir: Option<PathBuf>,
    /// tracing filter directive (e.g. "threadkeep_core=debug")
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE.to_string(),
            data_dir: None,
            log_filter: None,
        }
    }
}

impl Settings {
    /// Load settings from the settings file (defaults if missing or invalid),
    /// then apply environment overrides
    pub fn load() -> Self {
        let mut settings = PathManager::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    /// Read one settings file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        Self::from_toml_str(&content).unwrap_or_default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `THREADKEEP_*` overrides; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database_name = database;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = Some(filter);
        }
    }

    /// Store root: the configured directory, else the platform default
    pub fn store_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(PathManager::store_dir)
    }
}
