//! Per-scan processing state machine.
//!
//! A [`ScanPipeline`] moves through `Unloaded -> RawLoaded -> Mapped ->
//! Gridded`. Every stage result is stored as an `Arc` snapshot; a failed
//! transition leaves the previous stage and its snapshots untouched.

mod shared;

pub use shared::SharedScanPipeline;

use crate::common::PipelineConfig;
use crate::domain::{HklAxis, RsmError, RsmResult, ScanStage};
use crate::geometry::GeometryConfig;
use crate::gridding::{GridSpec, GriddedVolume, Gridder};
use crate::mapping::{CoordinateMapper, ReciprocalSpaceVolume, TransformFactory};
use crate::metadata::{AngleResolver, SpecScan};
use crate::normalize::{
    FrameLoader, FrameSelector, ImageFrameLoader, Normalizer, RawFrameStack, load_frame_stack,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
enum PipelineState {
    #[default]
    Unloaded,
    RawLoaded {
        raw: Arc<RawFrameStack>,
    },
    Mapped {
        raw: Arc<RawFrameStack>,
        rsm: Arc<ReciprocalSpaceVolume>,
    },
    Gridded {
        raw: Arc<RawFrameStack>,
        rsm: Arc<ReciprocalSpaceVolume>,
        gridded: Arc<GriddedVolume>,
    },
}

impl PipelineState {
    fn stage(&self) -> ScanStage {
        match self {
            Self::Unloaded => ScanStage::Unloaded,
            Self::RawLoaded { .. } => ScanStage::RawLoaded,
            Self::Mapped { .. } => ScanStage::Mapped,
            Self::Gridded { .. } => ScanStage::Gridded,
        }
    }
}

pub struct ScanPipeline {
    scan: Arc<SpecScan>,
    geometry: Arc<GeometryConfig>,
    config: Arc<PipelineConfig>,
    image_dir: PathBuf,
    loader: Arc<dyn FrameLoader>,
    mapper: CoordinateMapper,
    gridder: Gridder,
    state: PipelineState,
    grid_spec: Option<GridSpec>,
    warnings: Vec<RsmError>,
}

impl ScanPipeline {
    pub fn new(
        scan: Arc<SpecScan>,
        geometry: Arc<GeometryConfig>,
        image_dir: impl Into<PathBuf>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        let mapper = CoordinateMapper::for_geometry(
            Arc::clone(&geometry),
            config.missing_angle_policy,
        );
        Self {
            scan,
            geometry,
            config,
            image_dir: image_dir.into(),
            loader: Arc::new(ImageFrameLoader),
            mapper,
            gridder: Gridder,
            state: PipelineState::Unloaded,
            grid_spec: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_frame_loader(mut self, loader: Arc<dyn FrameLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_transform_factory(mut self, factory: Arc<dyn TransformFactory>) -> Self {
        self.mapper = CoordinateMapper::new(factory, self.config.missing_angle_policy);
        self
    }

    pub fn scan_number(&self) -> u32 {
        self.scan.number()
    }

    pub fn scan(&self) -> &SpecScan {
        &self.scan
    }

    pub fn metadata_version(&self) -> u64 {
        self.scan.version()
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn geometry(&self) -> &GeometryConfig {
        &self.geometry
    }

    pub fn stage(&self) -> ScanStage {
        self.state.stage()
    }

    /// Points dropped by the last raw load, one warning each.
    pub fn warnings(&self) -> &[RsmError] {
        &self.warnings
    }

    /// `Unloaded -> RawLoaded`: discovers, decodes and normalizes the frames.
    pub fn load_raw(&mut self) -> RsmResult<()> {
        self.require(ScanStage::Unloaded, "load raw frames")?;

        let normalizer = Normalizer::from_scan(&self.scan, &self.config.normalization)?;
        let selector = FrameSelector::new(&self.config.frames)?;
        let frames = selector.discover(&self.image_dir)?;
        let loaded = load_frame_stack(
            &frames,
            self.scan.data_lines(),
            Some(self.mapper.frame_shape()),
            self.loader.as_ref(),
            &normalizer,
        )?;

        let (points, rows, cols) = loaded.stack.shape();
        info!(
            scan = self.scan.number(),
            points,
            rows,
            cols,
            dropped = loaded.warnings.len(),
            "raw frames loaded"
        );
        self.warnings = loaded.warnings;
        self.state = PipelineState::RawLoaded {
            raw: Arc::new(loaded.stack),
        };
        Ok(())
    }

    /// `RawLoaded -> Mapped`: computes HKL for every loaded point and resets
    /// the grid parameters to the map bounds.
    pub fn map(&mut self) -> RsmResult<()> {
        let PipelineState::RawLoaded { raw } = &self.state else {
            return Err(self.transition_error(ScanStage::RawLoaded, "map to reciprocal space"));
        };
        let raw = Arc::clone(raw);

        let normalization = &self.config.normalization;
        let metadata = AngleResolver::new(&self.geometry, self.config.energy_column.clone())
            .with_normalization_columns(
                normalization.monitor_column.clone(),
                normalization.filter_column.clone(),
            )
            .resolve(&self.scan)?;
        let rsm = self.mapper.map_points(&metadata, raw.point_indices())?;
        let grid_spec = GridSpec::covering(&rsm, self.config.default_grid_points)?;

        info!(
            scan = self.scan.number(),
            points = rsm.point_count(),
            "reciprocal-space map computed"
        );
        self.grid_spec = Some(grid_spec);
        self.state = PipelineState::Mapped {
            raw,
            rsm: Arc::new(rsm),
        };
        Ok(())
    }

    /// `Mapped | Gridded -> Gridded`: grids with the current parameters.
    pub fn grid(&mut self) -> RsmResult<Arc<GriddedVolume>> {
        let (raw, rsm) = match &self.state {
            PipelineState::Mapped { raw, rsm } | PipelineState::Gridded { raw, rsm, .. } => {
                (Arc::clone(raw), Arc::clone(rsm))
            }
            _ => return Err(self.transition_error(ScanStage::Mapped, "grid")),
        };
        let spec = self.current_grid_spec()?;

        let gridded = Arc::new(self.gridder.grid(&raw, &rsm, &spec)?);
        info!(
            scan = self.scan.number(),
            shape = ?gridded.shape(),
            filled = gridded.filled_nodes(),
            "gridded volume computed"
        );
        self.state = PipelineState::Gridded {
            raw,
            rsm,
            gridded: Arc::clone(&gridded),
        };
        Ok(gridded)
    }

    pub fn grid_parameters(&self) -> Option<&GridSpec> {
        self.grid_spec.as_ref()
    }

    /// Validates and installs `(min, max, n)` per H, K, L axis. An invalid
    /// spec leaves the previous parameters and gridded volume in place.
    pub fn set_grid_parameters(&mut self, parts: [(f64, f64, usize); 3]) -> RsmResult<GridSpec> {
        self.require_map("set grid parameters")?;
        let spec = GridSpec::from_parts(parts)?;
        self.grid_spec = Some(spec);
        Ok(spec)
    }

    pub fn set_grid_spec(&mut self, spec: GridSpec) -> RsmResult<()> {
        self.require_map("set grid parameters")?;
        self.grid_spec = Some(spec);
        Ok(())
    }

    /// Restores the default grid spanning the reciprocal-space map.
    pub fn reset_grid_parameters(&mut self) -> RsmResult<GridSpec> {
        let rsm = self.require_map("reset grid parameters")?;
        let spec = GridSpec::covering(&rsm, self.config.default_grid_points)?;
        self.grid_spec = Some(spec);
        Ok(spec)
    }

    pub fn raw_image_data(&self) -> Option<Arc<RawFrameStack>> {
        match &self.state {
            PipelineState::Unloaded => None,
            PipelineState::RawLoaded { raw }
            | PipelineState::Mapped { raw, .. }
            | PipelineState::Gridded { raw, .. } => Some(Arc::clone(raw)),
        }
    }

    pub fn reciprocal_space_map(&self) -> Option<Arc<ReciprocalSpaceVolume>> {
        match &self.state {
            PipelineState::Mapped { rsm, .. } | PipelineState::Gridded { rsm, .. } => {
                Some(Arc::clone(rsm))
            }
            _ => None,
        }
    }

    pub fn gridded_image_data(&self) -> Option<Arc<GriddedVolume>> {
        match &self.state {
            PipelineState::Gridded { gridded, .. } => Some(Arc::clone(gridded)),
            _ => None,
        }
    }

    /// H, K and L node coordinates of the gridded volume.
    pub fn gridded_image_coords(&self) -> Option<[Vec<f64>; 3]> {
        self.gridded_image_data().map(|gridded| {
            [
                gridded.coordinates(HklAxis::H).to_vec(),
                gridded.coordinates(HklAxis::K).to_vec(),
                gridded.coordinates(HklAxis::L).to_vec(),
            ]
        })
    }

    /// Whether the gridded volume was built with the current parameters.
    pub fn gridded_is_current(&self) -> bool {
        match (&self.state, &self.grid_spec) {
            (PipelineState::Gridded { gridded, .. }, Some(spec)) => gridded.spec() == spec,
            _ => false,
        }
    }

    /// Installs a reloaded log entry for this scan. Snapshots built from a
    /// different log version are discarded and the pipeline returns to
    /// `Unloaded`. Returns whether that happened.
    pub fn replace_metadata(&mut self, scan: Arc<SpecScan>) -> RsmResult<bool> {
        if scan.number() != self.scan.number() {
            return Err(RsmError::invalid_transition(
                "STATE.SCAN_MISMATCH",
                format!(
                    "pipeline for scan {} cannot take metadata of scan {}",
                    self.scan.number(),
                    scan.number()
                ),
            ));
        }
        let invalidated = scan.version() != self.scan.version();
        self.scan = scan;
        if invalidated {
            if self.stage() != ScanStage::Unloaded {
                warn!(
                    scan = self.scan.number(),
                    stage = %self.stage(),
                    "metadata changed; discarding cached stages"
                );
            }
            self.reset();
        }
        Ok(invalidated)
    }

    /// Drops every snapshot and returns to `Unloaded`.
    pub fn reset(&mut self) {
        self.state = PipelineState::Unloaded;
        self.grid_spec = None;
        self.warnings.clear();
    }

    fn current_grid_spec(&self) -> RsmResult<GridSpec> {
        self.grid_spec.ok_or_else(|| {
            RsmError::invalid_transition(
                "STATE.NO_GRID_SPEC",
                "no grid parameters are set for this scan",
            )
        })
    }

    fn require(&self, expected: ScanStage, action: &str) -> RsmResult<()> {
        if self.stage() == expected {
            Ok(())
        } else {
            Err(self.transition_error(expected, action))
        }
    }

    fn require_map(&self, action: &str) -> RsmResult<Arc<ReciprocalSpaceVolume>> {
        self.reciprocal_space_map()
            .ok_or_else(|| self.transition_error(ScanStage::Mapped, action))
    }

    fn transition_error(&self, expected: ScanStage, action: &str) -> RsmError {
        RsmError::invalid_transition(
            "STATE.TRANSITION",
            format!(
                "cannot {} for scan {} in stage {}; expected {}",
                action,
                self.scan.number(),
                self.stage(),
                expected
            ),
        )
    }
}
