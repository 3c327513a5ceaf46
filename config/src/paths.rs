use std::path::PathBuf;

const APP_DIR: &str = "threadkeep";

pub struct PathManager;

impl PathManager {
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(APP_DIR))
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.toml"))
    }

    /// Default root of the filesystem document store
    pub fn store_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("store"))
    }
}
