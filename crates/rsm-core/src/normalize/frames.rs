use crate::common::FrameSelectionConfig;
use crate::domain::{RsmError, RsmResult};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};

/// Compiled frame-selection rules.
#[derive(Debug, Clone)]
pub struct FrameSelector {
    globs: GlobSet,
    excluded_markers: Vec<String>,
}

impl FrameSelector {
    pub fn new(config: &FrameSelectionConfig) -> RsmResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.file_globs {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| {
                    RsmError::invalid_config(
                        "CONFIG.FRAME_GLOB",
                        format!("invalid frame pattern '{}': {}", pattern, source),
                    )
                })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|source| {
            RsmError::invalid_config(
                "CONFIG.FRAME_GLOB",
                format!("failed to compile frame patterns: {}", source),
            )
        })?;

        Ok(Self {
            globs,
            excluded_markers: config
                .excluded_markers
                .iter()
                .map(|marker| marker.to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        if file_name.starts_with('.') {
            return false;
        }
        let lowered = file_name.to_ascii_lowercase();
        if self
            .excluded_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
        {
            return false;
        }
        self.globs.is_match(file_name)
    }

    /// Frame files of one scan directory in scan-point order.
    pub fn discover(&self, directory: &Path) -> RsmResult<Vec<PathBuf>> {
        if !directory.is_dir() {
            return Err(RsmError::scan_data_missing(
                "DATA.IMAGE_DIR",
                format!("image directory '{}' does not exist", directory.display()),
            ));
        }
        let entries = fs::read_dir(directory).map_err(|error| {
            RsmError::io_system(
                "IO.IMAGE_DIR",
                format!("failed to list '{}': {}", directory.display(), error),
            )
        })?;

        let mut frames = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| {
                RsmError::io_system(
                    "IO.IMAGE_DIR",
                    format!("failed to list '{}': {}", directory.display(), error),
                )
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if self.accepts(name) {
                frames.push(path);
            }
        }

        order_frames(&mut frames);
        Ok(frames)
    }
}

/// Orders by the trailing integer of each file stem when every file has one,
/// otherwise by file name.
pub fn order_frames(frames: &mut [PathBuf]) {
    let numbered: Option<Vec<u64>> = frames.iter().map(|path| trailing_number(path)).collect();
    match numbered {
        Some(_) => frames.sort_by(|a, b| {
            trailing_number(a)
                .cmp(&trailing_number(b))
                .then_with(|| a.file_name().cmp(&b.file_name()))
        }),
        None => frames.sort_by(|a, b| a.file_name().cmp(&b.file_name())),
    }
}

fn trailing_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits_start = stem
        .rfind(|character: char| !character.is_ascii_digit())
        .map_or(0, |index| index + 1);
    stem[digits_start..].parse().ok()
}
