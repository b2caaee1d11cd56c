//! Pipeline configuration, loaded from an optional JSON file.
//!
//! Every field has a default, so an empty object (or no file at all) yields
//! the beamline's standard behavior.

use super::constants::{
    DEFAULT_ENERGY_COLUMN, DEFAULT_EXCLUDED_FRAME_MARKERS, DEFAULT_FILTER_COLUMN,
    DEFAULT_FRAME_GLOBS, DEFAULT_GRID_POINTS, DEFAULT_MONITOR_COLUMN, DEFAULT_MONITOR_SCALE,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when an angle required by the geometry has no value in the
/// scan positioners or the data table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingAnglePolicy {
    /// Fail the mapping stage with a metadata error.
    #[default]
    Reject,
    /// Keep the angle at 0 and log a warning.
    ZeroDefault,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizationConfig {
    pub enabled: bool,
    pub monitor_column: String,
    pub filter_column: String,
    pub monitor_scale: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            monitor_column: DEFAULT_MONITOR_COLUMN.to_string(),
            filter_column: DEFAULT_FILTER_COLUMN.to_string(),
            monitor_scale: DEFAULT_MONITOR_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameSelectionConfig {
    pub file_globs: Vec<String>,
    pub excluded_markers: Vec<String>,
}

impl Default for FrameSelectionConfig {
    fn default() -> Self {
        Self {
            file_globs: DEFAULT_FRAME_GLOBS.iter().map(|glob| glob.to_string()).collect(),
            excluded_markers: DEFAULT_EXCLUDED_FRAME_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub normalization: NormalizationConfig,
    pub frames: FrameSelectionConfig,
    pub missing_angle_policy: MissingAnglePolicy,
    pub energy_column: String,
    pub default_grid_points: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalization: NormalizationConfig::default(),
            frames: FrameSelectionConfig::default(),
            missing_angle_policy: MissingAnglePolicy::default(),
            energy_column: DEFAULT_ENERGY_COLUMN.to_string(),
            default_grid_points: DEFAULT_GRID_POINTS,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.normalization.monitor_scale.is_finite() && self.normalization.monitor_scale > 0.0)
        {
            return Err(format!(
                "normalization.monitorScale must be positive, got {}",
                self.normalization.monitor_scale
            ));
        }
        if self.default_grid_points < 2 {
            return Err(format!(
                "defaultGridPoints must be at least 2, got {}",
                self.default_grid_points
            ));
        }
        if self.frames.file_globs.is_empty() {
            return Err("frames.fileGlobs must list at least one pattern".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineConfigError {
    #[error("failed to read pipeline config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse pipeline config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid pipeline config '{}': {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

pub fn load_pipeline_config(
    config_path: impl AsRef<Path>,
) -> Result<PipelineConfig, PipelineConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| PipelineConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig =
        serde_json::from_str(&source).map_err(|source| PipelineConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
    config
        .validate()
        .map_err(|reason| PipelineConfigError::Invalid {
            path: config_path.to_path_buf(),
            reason,
        })?;
    Ok(config)
}
