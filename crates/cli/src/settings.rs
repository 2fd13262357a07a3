use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use mouthwatch_core::detection::infrastructure::onnx_face_landmarker;
use mouthwatch_core::shared::constants::{
    DEFAULT_CHECK_INTERVAL_SECS, FINGERTIP_CONFIDENCE_THRESHOLD,
};

/// Preferences persisted between runs. Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub check_interval: f64,
    pub face_confidence: f64,
    pub fingertip_confidence: f32,
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    #[serde(default)]
    pub hand_model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            face_confidence: onnx_face_landmarker::DEFAULT_CONFIDENCE,
            fingertip_confidence: FINGERTIP_CONFIDENCE_THRESHOLD,
            snapshot_dir: None,
            hand_model: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Mouthwatch").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Reads settings from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
