//! Angle-to-HKL conversion for an area detector.

use crate::common::constants::HC_EV_ANGSTROM;
use crate::domain::{RsmError, RsmResult};
use crate::geometry::{CircleAxis, GeometryConfig};
use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use std::f64::consts::PI;
use std::sync::Arc;

/// Converts one point's angles into per-pixel HKL.
pub trait ScatteringTransform: Send + Sync {
    /// Returns `[3][rows][cols]` values in row-major order: all H values,
    /// then all K values, then all L values. `angles` follows the sample-
    /// then-detector circle order.
    fn pixel_hkl(&self, angles: &[f64], ub: Option<&Matrix3<f64>>) -> RsmResult<Vec<f64>>;
}

/// Builds a [`ScatteringTransform`] for one incident energy.
pub trait TransformFactory: Send + Sync {
    fn build(&self, energy_ev: f64) -> RsmResult<Arc<dyn ScatteringTransform>>;

    /// Detector `(rows, cols)` produced by every transform of this factory.
    fn frame_shape(&self) -> (usize, usize);
}

pub fn wavelength_angstrom(energy_ev: f64) -> f64 {
    HC_EV_ANGSTROM / energy_ev
}

/// Right-handed rotation about a signed laboratory axis.
fn circle_rotation(circle: &CircleAxis, degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(
        &Unit::new_normalize(circle.direction.unit_vector()),
        degrees.to_radians(),
    )
}

/// Outer-to-inner product of the circle rotations.
fn stacked_rotation(circles: &[CircleAxis], angles: &[f64]) -> Matrix3<f64> {
    circles
        .iter()
        .zip(angles)
        .fold(Matrix3::identity(), |matrix, (circle, angle)| {
            matrix * circle_rotation(circle, *angle).matrix()
        })
}

/// Area-detector Q conversion driven by a [`GeometryConfig`].
#[derive(Debug, Clone)]
pub struct AreaQConversion {
    geometry: Arc<GeometryConfig>,
    beam: Vector3<f64>,
    /// Unit vector from the sample to every pixel with all circles at zero,
    /// row-major over the full detector.
    pixel_directions: Arc<Vec<Vector3<f64>>>,
    sample_frame_ub: Matrix3<f64>,
}

impl AreaQConversion {
    pub fn new(geometry: Arc<GeometryConfig>) -> Self {
        let beam = geometry.primary_beam_direction().normalize();
        let detector = geometry.detector();
        let [width_1, width_2] = detector.pixel_width();
        let [center_1, center_2] = detector.center_pixel;
        let direction_1 = detector.pixel_direction_1.unit_vector();
        let direction_2 = detector.pixel_direction_2.unit_vector();

        let mut pixel_directions = Vec::with_capacity(detector.rows() * detector.cols());
        for row in 0..detector.rows() {
            let offset_1 = (row as f64 - center_1) * width_1 * direction_1;
            for col in 0..detector.cols() {
                let offset_2 = (col as f64 - center_2) * width_2 * direction_2;
                pixel_directions.push((detector.distance * beam + offset_1 + offset_2).normalize());
            }
        }

        let sample_frame_ub = sample_frame(&geometry);
        Self {
            geometry,
            beam,
            pixel_directions: Arc::new(pixel_directions),
            sample_frame_ub,
        }
    }
}

/// Matrix whose columns are the sample-frame axes: x = in-plane × normal,
/// y = in-plane, z = normal.
fn sample_frame(geometry: &GeometryConfig) -> Matrix3<f64> {
    let y = geometry.inplane_reference_direction().normalize();
    let z = geometry.sample_surface_normal_direction().normalize();
    let x = y.cross(&z).normalize();
    Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]).transpose()
}

impl TransformFactory for AreaQConversion {
    fn build(&self, energy_ev: f64) -> RsmResult<Arc<dyn ScatteringTransform>> {
        if !(energy_ev.is_finite() && energy_ev > 0.0) {
            return Err(RsmError::metadata_parse(
                "META.ENERGY",
                format!("incident energy must be positive, got {} eV", energy_ev),
            ));
        }
        Ok(Arc::new(AreaTransform {
            geometry: Arc::clone(&self.geometry),
            wave_number: 2.0 * PI / wavelength_angstrom(energy_ev),
            beam: self.beam,
            pixel_directions: Arc::clone(&self.pixel_directions),
            sample_frame_ub: self.sample_frame_ub,
        }))
    }

    fn frame_shape(&self) -> (usize, usize) {
        self.geometry.frame_shape()
    }
}

struct AreaTransform {
    geometry: Arc<GeometryConfig>,
    wave_number: f64,
    beam: Vector3<f64>,
    pixel_directions: Arc<Vec<Vector3<f64>>>,
    sample_frame_ub: Matrix3<f64>,
}

impl ScatteringTransform for AreaTransform {
    fn pixel_hkl(&self, angles: &[f64], ub: Option<&Matrix3<f64>>) -> RsmResult<Vec<f64>> {
        let sample_circles = self.geometry.sample_circles();
        let detector_circles = self.geometry.detector_circles();
        if angles.len() != sample_circles.len() + detector_circles.len() {
            return Err(RsmError::metadata_parse(
                "META.ANGLE_COUNT",
                format!(
                    "expected {} angles, got {}",
                    sample_circles.len() + detector_circles.len(),
                    angles.len()
                ),
            ));
        }
        let (sample_angles, detector_angles) = angles.split_at(sample_circles.len());

        let sample = stacked_rotation(sample_circles, sample_angles);
        let detector = stacked_rotation(detector_circles, detector_angles);
        let ub = ub.copied().unwrap_or(self.sample_frame_ub);
        let to_hkl = (sample * ub).try_inverse().ok_or_else(|| {
            RsmError::metadata_parse(
                "META.UB_SINGULAR",
                "sample rotation times UB matrix is singular",
            )
        })?;

        let pixels = self.pixel_directions.len();
        let mut hkl = vec![0.0; 3 * pixels];
        for (index, direction) in self.pixel_directions.iter().enumerate() {
            let q_lab = self.wave_number * (detector * direction - self.beam);
            let value = to_hkl * q_lab;
            hkl[index] = value.x;
            hkl[pixels + index] = value.y;
            hkl[2 * pixels + index] = value.z;
        }
        Ok(hkl)
    }
}
