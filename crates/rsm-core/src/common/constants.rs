//! Physical and instrument constants shared across the pipeline.

/// Planck constant times speed of light, in eV·Å.
pub const HC_EV_ANGSTROM: f64 = 12398.419843320026;

pub const KEV_TO_EV: f64 = 1000.0;

/// Grid point count used on every axis when a grid is reset to the map bounds.
pub const DEFAULT_GRID_POINTS: usize = 250;

/// Ion-chamber counts corresponding to a monitor factor of 1.
pub const DEFAULT_MONITOR_SCALE: f64 = 200_000.0;

pub const DEFAULT_MONITOR_COLUMN: &str = "Ion_Ch_2";
pub const DEFAULT_FILTER_COLUMN: &str = "transm";
pub const DEFAULT_ENERGY_COLUMN: &str = "Energy";

/// Scan-header record holding the incident energy in keV.
pub const ENERGY_HEADER_MARKER: &str = "#U";

/// Geometry record holding the row-major UB matrix.
pub const UB_HEADER_KEY: &str = "G3";

/// Upper bound on the total node count of one grid (512³), checked before
/// any grid buffer is allocated.
pub const MAX_GRID_NODES: usize = 512 * 512 * 512;

/// Half-width added around a map axis whose min equals its max.
pub const DEGENERATE_AXIS_PAD: f64 = 1.0e-6;

pub const DEFAULT_FRAME_GLOBS: [&str; 3] = ["*.tif", "*.tiff", "*.png"];
pub const DEFAULT_EXCLUDED_FRAME_MARKERS: [&str; 2] = ["alignment", "calibration"];
