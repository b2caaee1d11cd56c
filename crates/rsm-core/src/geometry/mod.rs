//! Diffractometer and area-detector geometry.
//!
//! A [`GeometryConfig`] combines one instrument file (goniometer circles and
//! reference directions) with the first detector of a detector file. It is
//! immutable once built and is shared between scan pipelines behind an `Arc`.

mod axis;
mod detector;
mod instrument;
mod xml;

pub use axis::AxisDirection;
pub use detector::DetectorGeometry;
pub use instrument::{CircleAxis, InstrumentGeometry};

use crate::domain::{RsmError, RsmResult};
use detector::parse_detector_source;
use instrument::parse_instrument_source;
use nalgebra::Vector3;
use std::fs;
use std::path::Path;

/// What an XML configuration file turned out to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFileKind {
    Instrument,
    Detector,
    Neither,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryConfig {
    instrument: InstrumentGeometry,
    detector: DetectorGeometry,
}

impl GeometryConfig {
    pub fn new(instrument: InstrumentGeometry, detector: DetectorGeometry) -> RsmResult<Self> {
        validate_instrument(&instrument)?;
        detector.validate()?;
        Ok(Self {
            instrument,
            detector,
        })
    }

    pub fn from_paths(
        instrument_path: impl AsRef<Path>,
        detector_path: impl AsRef<Path>,
    ) -> RsmResult<Self> {
        let instrument = parse_instrument_source(&read_config(instrument_path.as_ref())?)?;
        let mut detectors = parse_detector_source(&read_config(detector_path.as_ref())?)?;
        // parse_detector_source never returns an empty list
        let detector = detectors.swap_remove(0);
        Self::new(instrument, detector)
    }

    pub fn from_sources(instrument_source: &str, detector_source: &str) -> RsmResult<Self> {
        let instrument = parse_instrument_source(instrument_source)?;
        let mut detectors = parse_detector_source(detector_source)?;
        let detector = detectors.swap_remove(0);
        Self::new(instrument, detector)
    }

    /// Reports whether `path` holds a usable instrument file, a usable
    /// detector file, or neither. Unreadable files count as neither.
    pub fn classify_config(path: impl AsRef<Path>) -> ConfigFileKind {
        let Ok(source) = fs::read_to_string(path.as_ref()) else {
            return ConfigFileKind::Neither;
        };
        if parse_instrument_source(&source).is_ok() {
            ConfigFileKind::Instrument
        } else if parse_detector_source(&source).is_ok() {
            ConfigFileKind::Detector
        } else {
            ConfigFileKind::Neither
        }
    }

    pub fn instrument(&self) -> &InstrumentGeometry {
        &self.instrument
    }

    pub fn detector(&self) -> &DetectorGeometry {
        &self.detector
    }

    pub fn sample_circles(&self) -> &[CircleAxis] {
        &self.instrument.sample_circles
    }

    pub fn detector_circles(&self) -> &[CircleAxis] {
        &self.instrument.detector_circles
    }

    pub fn sample_circle_names(&self) -> Vec<String> {
        self.sample_circles()
            .iter()
            .map(|circle| circle.name.clone())
            .collect()
    }

    pub fn detector_circle_names(&self) -> Vec<String> {
        self.detector_circles()
            .iter()
            .map(|circle| circle.name.clone())
            .collect()
    }

    /// Sample-circle names followed by detector-circle names. Per-point angle
    /// rows are always stored in this order.
    pub fn angle_names(&self) -> Vec<String> {
        let mut names = self.sample_circle_names();
        names.extend(self.detector_circle_names());
        names
    }

    pub fn primary_beam_direction(&self) -> Vector3<f64> {
        self.instrument.primary_beam_direction
    }

    pub fn inplane_reference_direction(&self) -> Vector3<f64> {
        self.instrument.inplane_reference_direction
    }

    pub fn sample_surface_normal_direction(&self) -> Vector3<f64> {
        self.instrument.sample_surface_normal_direction
    }

    pub fn frame_shape(&self) -> (usize, usize) {
        (self.detector.rows(), self.detector.cols())
    }
}

fn read_config(path: &Path) -> RsmResult<String> {
    fs::read_to_string(path).map_err(|error| {
        RsmError::invalid_config(
            "CONFIG.READ",
            format!("failed to read '{}': {}", path.display(), error),
        )
    })
}

fn validate_instrument(instrument: &InstrumentGeometry) -> RsmResult<()> {
    if instrument.sample_circles.is_empty() || instrument.detector_circles.is_empty() {
        return Err(RsmError::invalid_config(
            "CONFIG.INSTRUMENT_CIRCLES",
            "instrument must define at least one sample circle and one detector circle",
        ));
    }
    if instrument.primary_beam_direction.norm() == 0.0 {
        return Err(RsmError::invalid_config(
            "CONFIG.INSTRUMENT_DIRECTION",
            "primary beam direction must be non-zero",
        ));
    }
    let cross = instrument
        .inplane_reference_direction
        .cross(&instrument.sample_surface_normal_direction);
    if cross.norm() == 0.0 {
        return Err(RsmError::invalid_config(
            "CONFIG.INSTRUMENT_DIRECTION",
            "in-plane reference and surface normal directions must not be parallel",
        ));
    }
    Ok(())
}
