use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{DEFAULT_MIN_FACE_SIZE, DEFAULT_TICK_INTERVAL_MS};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime configuration, read from JSON.
///
/// Every field has a default so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub save_url: String,
    pub check_url: String,
    pub min_face_size: u32,
    pub tick_interval_ms: u64,
    pub camera_source: String,
    pub camera_input_format: Option<String>,
    pub temp_dir: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub confidence: f64,
    pub upload_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_url: "http://localhost:8080/upload".to_string(),
            check_url: "http://localhost:8080/check".to_string(),
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            camera_source: "/dev/video0".to_string(),
            camera_input_format: default_input_format(),
            temp_dir: None,
            model_path: None,
            confidence: 0.25,
            upload_timeout_secs: None,
        }
    }
}

fn default_input_format() -> Option<String> {
    if cfg!(target_os = "linux") {
        Some("v4l2".to_string())
    } else {
        None
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCheck").join("settings.json"))
    }

    /// Loads from the platform config path, falling back to defaults when
    /// the file is missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Loads from an explicit path. Unlike [`Settings::load`], errors are
    /// reported since the caller asked for this file specifically.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_secs.map(Duration::from_secs)
    }

    /// Directory for region files awaiting upload.
    pub fn region_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("facecheck"))
    }
}
