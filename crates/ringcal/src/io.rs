//! JSON configuration and report helpers for ring-grid detection.

use crate::rings::{
    RingBoardSpec, RingGridDetection, RingGridDetector, RingGridError, RingGridParams,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum RingIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Configuration of a one-image detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingGridDetectConfig {
    pub image_path: String,
    pub board: RingBoardSpec,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Detector parameter overrides; defaults when absent.
    #[serde(default)]
    pub params: Option<RingGridParams>,
}

impl RingGridDetectConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RingIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RingIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ring_grid_detect_report.json"))
    }

    pub fn build_params(&self) -> RingGridParams {
        self.params.clone().unwrap_or_default()
    }

    /// Build a detector from this config.
    pub fn build_detector(&self) -> Result<RingGridDetector, RingGridError> {
        RingGridDetector::new(self.board, self.build_params())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingGridDetectReport {
    pub image_path: String,
    pub config_path: String,
    pub board: RingBoardSpec,
    #[serde(default)]
    pub image_size: Option<[usize; 2]>,
    #[serde(default)]
    pub detection: Option<RingGridDetection>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RingGridDetectReport {
    /// Build a base report from the input config.
    pub fn new(cfg: &RingGridDetectConfig, config_path: &Path) -> Self {
        Self {
            image_path: cfg.image_path.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            board: cfg.board,
            image_size: None,
            detection: None,
            error: None,
        }
    }

    pub fn set_detection(&mut self, res: RingGridDetection) {
        self.detection = Some(res);
        self.error = None;
    }

    /// Record a detection error.
    pub fn set_error(&mut self, err: impl std::fmt::Display) {
        self.detection = None;
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RingIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RingIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
