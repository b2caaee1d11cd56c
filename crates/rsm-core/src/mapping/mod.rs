//! Detector pixel to reciprocal-space coordinate mapping.

mod mapper;
mod transform;
mod volume;

pub use mapper::CoordinateMapper;
pub use transform::{AreaQConversion, ScatteringTransform, TransformFactory, wavelength_angstrom};
pub use volume::{ReciprocalSpaceVolume, coord_major_to_pixel_major};

#[cfg(test)]
pub(crate) mod test_support {
    pub(crate) use super::mapper::tests::{RecordingFactory, named_geometry};
}
