//! Project directory discovery.
//!
//! A project root holds a SPEC log (`*.spec`), an instrument and a detector
//! configuration (`*.xml`, told apart by content) and an `images/` tree with
//! one `images/<log stem>/S<NNN>/` directory of frames per scan.

use crate::common::PipelineConfig;
use crate::domain::{RsmError, RsmResult};
use crate::geometry::{ConfigFileKind, GeometryConfig};
use crate::metadata::SpecLog;
use crate::normalize::FrameSelector;
use crate::pipeline::ScanPipeline;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const IMAGES_DIR: &str = "images";

/// Files found in a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub spec_paths: Vec<PathBuf>,
    pub instrument_path: PathBuf,
    pub detector_path: PathBuf,
}

impl ProjectLayout {
    pub fn discover(root: impl AsRef<Path>) -> RsmResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(RsmError::invalid_config(
                "CONFIG.PROJECT_ROOT",
                format!("project root '{}' is not a directory", root.display()),
            ));
        }
        let mut entries = fs::read_dir(root)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|entry| entry.path()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|error| {
                RsmError::io_system(
                    "IO.PROJECT_ROOT",
                    format!("failed to list '{}': {}", root.display(), error),
                )
            })?;
        entries.sort();

        let spec_paths: Vec<PathBuf> = entries
            .iter()
            .filter(|path| path.is_file() && has_extension(path, "spec"))
            .cloned()
            .collect();
        if spec_paths.is_empty() {
            return Err(RsmError::invalid_config(
                "CONFIG.PROJECT_SPEC",
                format!("project '{}' has no .spec log", root.display()),
            ));
        }

        let mut instruments = Vec::new();
        let mut detectors = Vec::new();
        for path in entries
            .iter()
            .filter(|path| path.is_file() && has_extension(path, "xml"))
        {
            match GeometryConfig::classify_config(path) {
                ConfigFileKind::Instrument => instruments.push(path.clone()),
                ConfigFileKind::Detector => detectors.push(path.clone()),
                ConfigFileKind::Neither => {}
            }
        }
        let instrument_path = single(instruments, root, "instrument")?;
        let detector_path = single(detectors, root, "detector")?;

        if !root.join(IMAGES_DIR).is_dir() {
            return Err(RsmError::invalid_config(
                "CONFIG.PROJECT_IMAGES",
                format!("project '{}' has no images directory", root.display()),
            ));
        }

        Ok(Self {
            root: root.to_path_buf(),
            spec_paths,
            instrument_path,
            detector_path,
        })
    }

    /// Whether `root` looks like a complete project.
    pub fn is_valid(root: impl AsRef<Path>) -> bool {
        Self::discover(root).is_ok()
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .is_some_and(|value| value.eq_ignore_ascii_case(extension))
}

fn single(mut paths: Vec<PathBuf>, root: &Path, kind: &str) -> RsmResult<PathBuf> {
    match paths.len() {
        1 => Ok(paths.remove(0)),
        0 => Err(RsmError::invalid_config(
            "CONFIG.PROJECT_XML",
            format!("project '{}' has no valid {} configuration", root.display(), kind),
        )),
        count => Err(RsmError::invalid_config(
            "CONFIG.PROJECT_XML",
            format!(
                "project '{}' has {} {} configurations; expected one",
                root.display(),
                count,
                kind
            ),
        )),
    }
}

/// Frame directory of one scan.
pub fn scan_image_dir(root: &Path, spec_path: &Path, scan_number: u32) -> PathBuf {
    let stem = spec_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    root.join(IMAGES_DIR)
        .join(stem)
        .join(format!("S{:03}", scan_number))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub number: u32,
    pub command: String,
    pub points: usize,
    pub frames: usize,
}

/// An opened project: one SPEC log plus the shared geometry.
#[derive(Debug, Clone)]
pub struct Project {
    layout: ProjectLayout,
    spec_path: PathBuf,
    log: Arc<SpecLog>,
    geometry: Arc<GeometryConfig>,
    config: Arc<PipelineConfig>,
}

impl Project {
    /// Opens the project's only SPEC log.
    pub fn open(root: impl AsRef<Path>, config: PipelineConfig) -> RsmResult<Self> {
        let layout = ProjectLayout::discover(root)?;
        if layout.spec_paths.len() != 1 {
            return Err(RsmError::invalid_config(
                "CONFIG.PROJECT_SPEC",
                format!(
                    "project '{}' has {} .spec logs; name the one to open",
                    layout.root.display(),
                    layout.spec_paths.len()
                ),
            ));
        }
        let spec_path = layout.spec_paths[0].clone();
        Self::open_layout(layout, spec_path, config)
    }

    /// Opens the project with the named SPEC log (file name inside the root).
    pub fn open_log(
        root: impl AsRef<Path>,
        spec_file_name: &str,
        config: PipelineConfig,
    ) -> RsmResult<Self> {
        let layout = ProjectLayout::discover(root)?;
        let spec_path = layout
            .spec_paths
            .iter()
            .find(|path| path.file_name().is_some_and(|name| name == spec_file_name))
            .cloned()
            .ok_or_else(|| {
                RsmError::invalid_config(
                    "CONFIG.PROJECT_SPEC",
                    format!(
                        "project '{}' has no log named '{}'",
                        layout.root.display(),
                        spec_file_name
                    ),
                )
            })?;
        Self::open_layout(layout, spec_path, config)
    }

    fn open_layout(
        layout: ProjectLayout,
        spec_path: PathBuf,
        config: PipelineConfig,
    ) -> RsmResult<Self> {
        let geometry = GeometryConfig::from_paths(&layout.instrument_path, &layout.detector_path)?;
        let log = SpecLog::open(&spec_path)?;
        info!(
            root = %layout.root.display(),
            log = %spec_path.display(),
            scans = log.scans().len(),
            "project opened"
        );
        Ok(Self {
            layout,
            spec_path,
            log: Arc::new(log),
            geometry: Arc::new(geometry),
            config: Arc::new(config),
        })
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn spec_path(&self) -> &Path {
        &self.spec_path
    }

    pub fn log(&self) -> &SpecLog {
        &self.log
    }

    pub fn geometry(&self) -> Arc<GeometryConfig> {
        Arc::clone(&self.geometry)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn image_dir(&self, scan_number: u32) -> PathBuf {
        scan_image_dir(&self.layout.root, &self.spec_path, scan_number)
    }

    /// Number, command, point count and selectable frame count per scan.
    pub fn scan_summaries(&self) -> RsmResult<Vec<ScanSummary>> {
        let selector = FrameSelector::new(&self.config.frames)?;
        Ok(self
            .log
            .scans()
            .iter()
            .map(|scan| ScanSummary {
                number: scan.number(),
                command: scan.command().to_string(),
                points: scan.data_lines(),
                frames: selector
                    .discover(&self.image_dir(scan.number()))
                    .map_or(0, |frames| frames.len()),
            })
            .collect())
    }

    /// Re-reads the SPEC log. Pipelines pick the change up through
    /// [`ScanPipeline::replace_metadata`].
    pub fn reload_log(&mut self) -> RsmResult<()> {
        self.log = Arc::new(SpecLog::open(&self.spec_path)?);
        Ok(())
    }

    pub fn pipeline(&self, scan_number: u32) -> RsmResult<ScanPipeline> {
        let scan = self.log.scan(scan_number).ok_or_else(|| {
            RsmError::invalid_config(
                "CONFIG.SCAN_NOT_FOUND",
                format!(
                    "scan {} is not in '{}'",
                    scan_number,
                    self.spec_path.display()
                ),
            )
        })?;
        Ok(ScanPipeline::new(
            Arc::new(scan.clone()),
            Arc::clone(&self.geometry),
            self.image_dir(scan_number),
            Arc::clone(&self.config),
        ))
    }
}
