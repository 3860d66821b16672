// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::CameraSelector;
use crate::constants::{
    APP_DIR, CONFIG_FILE_NAME, DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_LOG_FILTER,
};
use crate::errors::{AppError, AppResult};
use crate::pipelines::video::EncoderProfile;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Private directory for segment files (None = cache dir default)
    pub working_dir: Option<PathBuf>,
    /// Camera selected when the recorder starts
    pub initial_camera: CameraSelector,
    /// Bounded wait for the device permit, in milliseconds
    pub acquire_timeout_ms: u64,
    /// Encoding profile applied to every segment
    pub encoder: EncoderProfile,
    /// tracing filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: None,
            initial_camera: CameraSelector::Primary,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            encoder: EncoderProfile::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Default location: `<config_dir>/camera-segments/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, or defaults when there is none
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Effective segment directory
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(storage::default_working_dir)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}
