//! Reciprocal-space mapping for area-detector X-ray diffraction scans.
//!
//! A scan's detector frames are normalized, every pixel is converted to an
//! (H, K, L) coordinate from the diffractometer angles and the instrument
//! geometry, and the scattered samples are resampled onto a regular grid.

pub mod common;
pub mod domain;
pub mod export;
pub mod geometry;
pub mod gridding;
pub mod mapping;
pub mod metadata;
pub mod normalize;
pub mod numerics;
pub mod pipeline;
pub mod project;

pub use domain::{HklAxis, RsmError, RsmErrorKind, RsmResult, ScanStage};
