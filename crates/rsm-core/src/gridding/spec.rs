use crate::common::constants::{DEGENERATE_AXIS_PAD, MAX_GRID_NODES};
use crate::domain::{HklAxis, RsmError, RsmResult};
use crate::mapping::ReciprocalSpaceVolume;
use crate::numerics::linspace;
use serde::{Deserialize, Serialize};

/// Inclusive bounds and node count of one grid axis. Always satisfies
/// `min < max` and `n >= 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAxisRange")]
pub struct AxisRange {
    min: f64,
    max: f64,
    n: usize,
}

#[derive(Deserialize)]
struct RawAxisRange {
    min: f64,
    max: f64,
    n: usize,
}

impl TryFrom<RawAxisRange> for AxisRange {
    type Error = RsmError;

    fn try_from(raw: RawAxisRange) -> RsmResult<Self> {
        Self::new(raw.min, raw.max, raw.n)
    }
}

impl AxisRange {
    pub fn new(min: f64, max: f64, n: usize) -> RsmResult<Self> {
        if n < 2 {
            return Err(RsmError::invalid_grid_spec(
                "GRID.POINT_COUNT",
                format!("axis needs at least 2 points, got {}", n),
            ));
        }
        if !(min.is_finite() && max.is_finite()) {
            return Err(RsmError::invalid_grid_spec(
                "GRID.BOUNDS",
                format!("axis bounds must be finite, got [{}, {}]", min, max),
            ));
        }
        if min >= max {
            return Err(RsmError::invalid_grid_spec(
                "GRID.BOUNDS",
                format!("axis min {} must be below max {}", min, max),
            ));
        }
        Ok(Self { min, max, n })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn step(&self) -> f64 {
        (self.max - self.min) / (self.n - 1) as f64
    }

    pub fn coordinates(&self) -> Vec<f64> {
        linspace(self.min, self.max, self.n)
    }

    /// Nearest node of `value`, or `None` outside `[min, max]`.
    pub fn node_index(&self, value: f64) -> Option<usize> {
        if !(self.min..=self.max).contains(&value) {
            return None;
        }
        let index = ((value - self.min) / self.step()).round() as usize;
        Some(index.min(self.n - 1))
    }
}

/// Bounds and node counts of the H, K and L grid axes. The total node count
/// never exceeds [`MAX_GRID_NODES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGridSpec")]
pub struct GridSpec {
    pub(crate) h: AxisRange,
    pub(crate) k: AxisRange,
    pub(crate) l: AxisRange,
}

#[derive(Deserialize)]
struct RawGridSpec {
    h: AxisRange,
    k: AxisRange,
    l: AxisRange,
}

impl TryFrom<RawGridSpec> for GridSpec {
    type Error = RsmError;

    fn try_from(raw: RawGridSpec) -> RsmResult<Self> {
        Self::new(raw.h, raw.k, raw.l)
    }
}

impl GridSpec {
    pub fn new(h: AxisRange, k: AxisRange, l: AxisRange) -> RsmResult<Self> {
        let total = h
            .n
            .checked_mul(k.n)
            .and_then(|count| count.checked_mul(l.n))
            .filter(|count| *count <= MAX_GRID_NODES);
        if total.is_none() {
            return Err(RsmError::invalid_grid_spec(
                "GRID.POINT_COUNT",
                format!(
                    "grid of {}x{}x{} nodes exceeds the limit of {} nodes",
                    h.n, k.n, l.n, MAX_GRID_NODES
                ),
            ));
        }
        Ok(Self { h, k, l })
    }

    /// Builds a spec from `(min, max, n)` per axis in H, K, L order.
    pub fn from_parts(parts: [(f64, f64, usize); 3]) -> RsmResult<Self> {
        let mut ranges = Vec::with_capacity(3);
        for (axis, (min, max, n)) in HklAxis::ALL.into_iter().zip(parts) {
            let range = AxisRange::new(min, max, n).map_err(|error| {
                RsmError::invalid_grid_spec(
                    error.placeholder(),
                    format!("{} axis: {}", axis, error.message()),
                )
            })?;
            ranges.push(range);
        }
        Self::new(ranges[0], ranges[1], ranges[2])
    }

    /// Spans the map's finite coordinates with `n` nodes per axis. Axes where
    /// every sample shares one value are widened slightly so the spec stays
    /// valid.
    pub fn covering(rsm: &ReciprocalSpaceVolume, n: usize) -> RsmResult<Self> {
        let mut parts = [(0.0, 0.0, n); 3];
        for axis in HklAxis::ALL {
            let (min, max) = rsm.axis_bounds(axis).ok_or_else(|| {
                RsmError::invalid_grid_spec(
                    "GRID.EMPTY_MAP",
                    format!("reciprocal-space map has no finite {} values", axis),
                )
            })?;
            parts[axis.index()] = if min == max {
                (min - DEGENERATE_AXIS_PAD, max + DEGENERATE_AXIS_PAD, n)
            } else {
                (min, max, n)
            };
        }
        Self::from_parts(parts)
    }

    pub fn axis(&self, axis: HklAxis) -> &AxisRange {
        match axis {
            HklAxis::H => &self.h,
            HklAxis::K => &self.k,
            HklAxis::L => &self.l,
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.h.n, self.k.n, self.l.n)
    }

    pub fn node_count(&self) -> usize {
        self.h.n * self.k.n * self.l.n
    }
}

#[cfg(test)]
mod tests {
    use super::{AxisRange, GridSpec};
    use crate::common::constants::MAX_GRID_NODES;
    use crate::domain::{HklAxis, RsmErrorKind};
    use crate::mapping::ReciprocalSpaceVolume;

    #[test]
    fn equal_bounds_are_rejected() {
        let error = GridSpec::from_parts([(1.0, 1.0, 250), (0.0, 1.0, 250), (0.0, 1.0, 250)])
            .expect_err("min == max");
        assert_eq!(error.kind(), RsmErrorKind::InvalidGridSpec);
        assert_eq!(error.placeholder(), "GRID.BOUNDS");
        assert!(error.message().starts_with("H axis"));
    }

    #[test]
    fn fewer_than_two_points_are_rejected() {
        let error = AxisRange::new(0.0, 1.0, 1).expect_err("n == 1");
        assert_eq!(error.placeholder(), "GRID.POINT_COUNT");
        assert!(AxisRange::new(0.0, f64::INFINITY, 4).is_err());
        assert!(AxisRange::new(2.0, 1.0, 4).is_err());
    }

    #[test]
    fn oversized_grids_are_rejected_before_allocation() {
        let huge = 1_usize << 22;
        let error = GridSpec::from_parts([(0.0, 1.0, huge); 3]).expect_err("product overflows");
        assert_eq!(error.kind(), RsmErrorKind::InvalidGridSpec);
        assert_eq!(error.placeholder(), "GRID.POINT_COUNT");

        let error = GridSpec::from_parts([(0.0, 1.0, usize::MAX), (0.0, 1.0, 2), (0.0, 1.0, 2)])
            .expect_err("saturated node count");
        assert_eq!(error.placeholder(), "GRID.POINT_COUNT");

        let error = GridSpec::from_parts([(0.0, 1.0, 1024), (0.0, 1.0, 1024), (0.0, 1.0, 1024)])
            .expect_err("above the node limit");
        assert_eq!(error.placeholder(), "GRID.POINT_COUNT");

        let spec = GridSpec::from_parts([(0.0, 1.0, 512), (0.0, 1.0, 512), (0.0, 1.0, 512)])
            .expect("exactly at the limit");
        assert_eq!(spec.node_count(), MAX_GRID_NODES);
    }

    #[test]
    fn node_index_rounds_to_nearest_and_clips() {
        let range = AxisRange::new(0.0, 1.0, 5).expect("valid range");
        assert_eq!(range.step(), 0.25);
        assert_eq!(range.node_index(0.0), Some(0));
        assert_eq!(range.node_index(0.3), Some(1));
        assert_eq!(range.node_index(0.4), Some(2));
        assert_eq!(range.node_index(1.0), Some(4));
        assert_eq!(range.node_index(1.0001), None);
        assert_eq!(range.node_index(-0.0001), None);
        assert_eq!(range.node_index(f64::NAN), None);
    }

    #[test]
    fn covering_spec_pads_degenerate_axes() {
        let rsm = ReciprocalSpaceVolume::new(
            vec![0],
            1,
            2,
            vec![0.0, 1.0, 5.0, 2.0, 1.0, 6.0],
        );
        let spec = GridSpec::covering(&rsm, 250).expect("spec covers the map");
        assert_eq!((spec.h.min(), spec.h.max()), (0.0, 2.0));
        assert_eq!((spec.l.min(), spec.l.max()), (5.0, 6.0));
        assert!(spec.k.min() < 1.0 && spec.k.max() > 1.0);
        assert_eq!(spec.axis(HklAxis::K).n(), 250);
        assert_eq!(spec.shape(), (250, 250, 250));
    }

    #[test]
    fn deserialization_validates_ranges() {
        let spec: GridSpec = serde_json::from_str(
            r#"{"h":{"min":0,"max":1,"n":3},"k":{"min":0,"max":1,"n":3},"l":{"min":-1,"max":1,"n":2}}"#,
        )
        .expect("valid spec parses");
        assert_eq!(spec.shape(), (3, 3, 2));

        let invalid = serde_json::from_str::<GridSpec>(
            r#"{"h":{"min":1,"max":1,"n":3},"k":{"min":0,"max":1,"n":3},"l":{"min":0,"max":1,"n":3}}"#,
        );
        assert!(invalid.is_err());

        let oversized = serde_json::from_str::<GridSpec>(
            r#"{"h":{"min":0,"max":1,"n":4096},"k":{"min":0,"max":1,"n":4096},"l":{"min":0,"max":1,"n":4096}}"#,
        );
        assert!(oversized.is_err());
    }
}
