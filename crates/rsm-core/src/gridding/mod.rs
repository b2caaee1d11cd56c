//! Resampling of the irregular HKL point cloud onto a rectilinear grid.

mod gridder;
mod spec;

pub use gridder::{GriddedVolume, Gridder};
pub use spec::{AxisRange, GridSpec};
