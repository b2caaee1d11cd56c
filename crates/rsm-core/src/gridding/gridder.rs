use super::spec::GridSpec;
use crate::domain::{HklAxis, RsmError, RsmResult};
use crate::mapping::ReciprocalSpaceVolume;
use crate::normalize::RawFrameStack;
use crate::numerics::stable_sum;

/// Regular H x K x L grid, indexed `[h][k][l]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedVolume {
    spec: GridSpec,
    data: Vec<f64>,
    counts: Vec<u32>,
    coordinates: [Vec<f64>; 3],
}

impl GriddedVolume {
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.spec.shape()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn value(&self, h: usize, k: usize, l: usize) -> f64 {
        self.data[self.flat_index(h, k, l)]
    }

    pub fn count(&self, h: usize, k: usize, l: usize) -> u32 {
        self.counts[self.flat_index(h, k, l)]
    }

    pub fn coordinates(&self, axis: HklAxis) -> &[f64] {
        &self.coordinates[axis.index()]
    }

    /// Nodes that received at least one sample.
    pub fn filled_nodes(&self) -> usize {
        self.counts.iter().filter(|count| **count > 0).count()
    }

    pub fn total_intensity(&self) -> f64 {
        stable_sum(&self.data)
    }

    fn flat_index(&self, h: usize, k: usize, l: usize) -> usize {
        let (_, k_n, l_n) = self.spec.shape();
        (h * k_n + k) * l_n + l
    }
}

/// Nearest-node gridder: each sample lands on the node closest to its HKL,
/// a node holds the mean of its samples and empty nodes hold 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gridder;

impl Gridder {
    pub fn grid(
        &self,
        raw: &RawFrameStack,
        rsm: &ReciprocalSpaceVolume,
        spec: &GridSpec,
    ) -> RsmResult<GriddedVolume> {
        if raw.shape() != rsm.shape() || raw.point_indices() != rsm.point_indices() {
            return Err(RsmError::scan_data_missing(
                "DATA.RSM_SHAPE",
                format!(
                    "frame stack {:?} at points {:?} does not match reciprocal-space map {:?} at points {:?}",
                    raw.shape(),
                    raw.point_indices(),
                    rsm.shape(),
                    rsm.point_indices()
                ),
            ));
        }

        let coordinates = rsm.as_slice().chunks_exact(3);
        let samples = raw
            .as_slice()
            .iter()
            .zip(coordinates)
            .map(|(intensity, hkl)| (*intensity, [hkl[0], hkl[1], hkl[2]]));
        Ok(self.grid_samples(samples, spec))
    }

    /// Grids `(intensity, [h, k, l])` samples. Samples outside the spec's
    /// bounds or with non-finite values are ignored.
    pub fn grid_samples<I>(&self, samples: I, spec: &GridSpec) -> GriddedVolume
    where
        I: IntoIterator<Item = (f64, [f64; 3])>,
    {
        let (_, k_n, l_n) = spec.shape();
        let mut data = vec![0.0; spec.node_count()];
        let mut counts = vec![0_u32; spec.node_count()];

        for (intensity, [h, k, l]) in samples {
            if !intensity.is_finite() {
                continue;
            }
            let (Some(ih), Some(ik), Some(il)) = (
                spec.h.node_index(h),
                spec.k.node_index(k),
                spec.l.node_index(l),
            ) else {
                continue;
            };
            let index = (ih * k_n + ik) * l_n + il;
            data[index] += intensity;
            counts[index] += 1;
        }

        for (value, count) in data.iter_mut().zip(&counts) {
            if *count > 0 {
                *value /= f64::from(*count);
            }
        }

        GriddedVolume {
            spec: *spec,
            data,
            counts,
            coordinates: [
                spec.h.coordinates(),
                spec.k.coordinates(),
                spec.l.coordinates(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Gridder;
    use crate::domain::{HklAxis, RsmErrorKind};
    use crate::gridding::GridSpec;
    use crate::mapping::ReciprocalSpaceVolume;
    use crate::normalize::{Frame, RawFrameStack};

    fn spec(parts: [(f64, f64, usize); 3]) -> GridSpec {
        GridSpec::from_parts(parts).expect("valid grid spec")
    }

    #[test]
    fn output_shape_and_coordinates_follow_the_spec() {
        let spec = spec([(-1.0, 1.0, 5), (0.0, 2.0, 3), (10.0, 11.0, 7)]);
        let volume = Gridder.grid_samples(Vec::<(f64, [f64; 3])>::new(), &spec);

        assert_eq!(volume.shape(), (5, 3, 7));
        assert_eq!(volume.as_slice().len(), 5 * 3 * 7);
        for axis in HklAxis::ALL {
            let range = spec.axis(axis);
            let coords = volume.coordinates(axis);
            assert_eq!(coords.len(), range.n());
            assert!((coords[0] - range.min()).abs() < 1.0e-12);
            assert!((coords[coords.len() - 1] - range.max()).abs() < 1.0e-12);
        }
        assert!(volume.as_slice().iter().all(|value| *value == 0.0));
    }

    #[test]
    fn single_sample_on_a_node_is_reproduced() {
        let spec = spec([(0.0, 1.0, 3), (0.0, 1.0, 3), (0.0, 1.0, 3)]);
        let volume = Gridder.grid_samples([(7.25, [0.5, 1.0, 0.0])], &spec);

        assert_eq!(volume.value(1, 2, 0), 7.25);
        assert_eq!(volume.count(1, 2, 0), 1);
        assert_eq!(volume.filled_nodes(), 1);
        assert_eq!(volume.total_intensity(), 7.25);
    }

    #[test]
    fn shared_nodes_average_and_outliers_are_dropped() {
        let spec = spec([(0.0, 1.0, 2), (0.0, 1.0, 2), (0.0, 1.0, 2)]);
        let volume = Gridder.grid_samples(
            [
                (2.0, [0.1, 0.0, 0.0]),
                (4.0, [0.2, 0.1, 0.0]),
                (100.0, [1.5, 0.0, 0.0]),
                (f64::NAN, [0.0, 0.0, 0.0]),
                (50.0, [0.0, f64::INFINITY, 0.0]),
            ],
            &spec,
        );

        assert_eq!(volume.value(0, 0, 0), 3.0);
        assert_eq!(volume.count(0, 0, 0), 2);
        assert_eq!(volume.filled_nodes(), 1);
    }

    #[test]
    fn stack_and_map_must_describe_the_same_points() {
        let mut raw = RawFrameStack::new(1, 1);
        raw.push(0, &Frame::filled(1, 1, 1.0)).expect("frame fits");
        let rsm = ReciprocalSpaceVolume::new(vec![1], 1, 1, vec![0.0, 0.0, 0.0]);
        let spec = spec([(0.0, 1.0, 2), (0.0, 1.0, 2), (0.0, 1.0, 2)]);

        let error = Gridder.grid(&raw, &rsm, &spec).expect_err("point 0 vs point 1");
        assert_eq!(error.kind(), RsmErrorKind::ScanDataMissing);
        assert_eq!(error.placeholder(), "DATA.RSM_SHAPE");
        assert!(error.message().contains("at points [0]"), "{}", error.message());
        assert!(error.message().contains("at points [1]"), "{}", error.message());
    }
}
