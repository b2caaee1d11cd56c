//! Experiment-log access: the SPEC reader and per-scan angle resolution.

mod angles;
pub(crate) mod spec_file;

pub use angles::{AngleResolver, ScanMetadata};
pub use spec_file::{SpecLog, SpecScan};
