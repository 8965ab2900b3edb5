//! Application settings, read from a YAML file.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vs_commands::HOURS_IN_YEAR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the variant store (base studies, command logs, snapshots).
    pub storage_root: PathBuf,
    pub matrix_dir: PathBuf,
    /// Remove the snapshot of a failed generation instead of keeping the partial tree.
    pub delete_on_failure: bool,
    pub log_filter: String,
    /// Rows of the hourly default matrices.
    pub hourly_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(".variants"),
            matrix_dir: PathBuf::from(".matrices"),
            delete_on_failure: true,
            log_filter: "info".to_string(),
            hourly_rows: HOURS_IN_YEAR,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))?;
        if config.hourly_rows == 0 {
            return Err(AppError::Config("hourly_rows must be positive".to_string()));
        }
        Ok(config)
    }

    /// Defaults when `path` is absent.
    pub fn load_or_default(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
