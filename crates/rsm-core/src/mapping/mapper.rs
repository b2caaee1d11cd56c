use super::transform::{AreaQConversion, ScatteringTransform, TransformFactory};
use super::volume::{ReciprocalSpaceVolume, coord_major_to_pixel_major};
use crate::common::MissingAnglePolicy;
use crate::domain::{RsmError, RsmResult};
use crate::geometry::GeometryConfig;
use crate::metadata::ScanMetadata;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps detector frames to reciprocal space, one point at a time.
#[derive(Clone)]
pub struct CoordinateMapper {
    factory: Arc<dyn TransformFactory>,
    missing_angle_policy: MissingAnglePolicy,
}

impl CoordinateMapper {
    pub fn new(factory: Arc<dyn TransformFactory>, missing_angle_policy: MissingAnglePolicy) -> Self {
        Self {
            factory,
            missing_angle_policy,
        }
    }

    pub fn for_geometry(
        geometry: Arc<GeometryConfig>,
        missing_angle_policy: MissingAnglePolicy,
    ) -> Self {
        Self::new(
            Arc::new(AreaQConversion::new(geometry)),
            missing_angle_policy,
        )
    }

    pub fn missing_angle_policy(&self) -> MissingAnglePolicy {
        self.missing_angle_policy
    }

    /// Detector `(rows, cols)` every mapped frame must have.
    pub fn frame_shape(&self) -> (usize, usize) {
        self.factory.frame_shape()
    }

    pub fn map_scan(&self, metadata: &ScanMetadata) -> RsmResult<ReciprocalSpaceVolume> {
        let points: Vec<usize> = (0..metadata.point_count).collect();
        self.map_points(metadata, &points)
    }

    /// Maps only the listed scan points, keeping their order.
    pub fn map_points(
        &self,
        metadata: &ScanMetadata,
        points: &[usize],
    ) -> RsmResult<ReciprocalSpaceVolume> {
        self.check_missing_angles(metadata)?;

        let mut transforms: Vec<Arc<dyn ScatteringTransform>> = Vec::with_capacity(points.len());
        let mut current: Option<(f64, Arc<dyn ScatteringTransform>)> = None;
        for &point in points {
            let energy = *metadata.point_energies.get(point).ok_or_else(|| {
                RsmError::metadata_parse(
                    "META.POINT_RANGE",
                    format!(
                        "scan {} has {} points, point {} requested",
                        metadata.scan_number, metadata.point_count, point
                    ),
                )
            })?;
            let transform = match &current {
                Some((cached, transform)) if *cached == energy => Arc::clone(transform),
                _ => {
                    debug!(scan = metadata.scan_number, energy_ev = energy, "building transform");
                    let transform = self.factory.build(energy)?;
                    current = Some((energy, Arc::clone(&transform)));
                    transform
                }
            };
            transforms.push(transform);
        }

        let maps = points
            .par_iter()
            .zip(transforms.par_iter())
            .map(|(&point, transform)| {
                let angles = metadata.point_angles(point).ok_or_else(|| {
                    RsmError::metadata_parse(
                        "META.POINT_RANGE",
                        format!("scan {} has no angles for point {}", metadata.scan_number, point),
                    )
                })?;
                transform.pixel_hkl(angles, metadata.ub.as_ref())
            })
            .collect::<RsmResult<Vec<Vec<f64>>>>()?;

        let (rows, cols) = self.factory.frame_shape();
        let mut stacked = Vec::with_capacity(points.len() * 3 * rows * cols);
        for map in maps {
            if map.len() != 3 * rows * cols {
                return Err(RsmError::invalid_config(
                    "CONFIG.DETECTOR_SHAPE",
                    format!(
                        "transform produced {} values for a {}x{} detector",
                        map.len(),
                        rows,
                        cols
                    ),
                ));
            }
            stacked.extend(map);
        }

        Ok(ReciprocalSpaceVolume::new(
            points.to_vec(),
            rows,
            cols,
            coord_major_to_pixel_major(&stacked, points.len(), rows, cols),
        ))
    }

    fn check_missing_angles(&self, metadata: &ScanMetadata) -> RsmResult<()> {
        if metadata.missing_angles.is_empty() {
            return Ok(());
        }
        let missing = metadata.missing_angles.join(", ");
        match self.missing_angle_policy {
            MissingAnglePolicy::Reject => Err(RsmError::metadata_parse(
                "META.MISSING_ANGLE",
                format!(
                    "scan {} has no value for angle(s) {}",
                    metadata.scan_number, missing
                ),
            )),
            MissingAnglePolicy::ZeroDefault => {
                warn!(
                    scan = metadata.scan_number,
                    angles = %missing,
                    "angle values missing; using 0"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::CoordinateMapper;
    use crate::common::MissingAnglePolicy;
    use crate::domain::{RsmErrorKind, RsmResult};
    use crate::geometry::{
        AxisDirection, CircleAxis, DetectorGeometry, GeometryConfig, InstrumentGeometry,
    };
    use crate::mapping::{ScatteringTransform, TransformFactory};
    use crate::metadata::{AngleResolver, SpecLog};
    use nalgebra::{Matrix3, Vector3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Stub factory: records every angle list and emits H = row, K = col,
    /// L = first angle for each pixel.
    #[derive(Default)]
    pub(crate) struct RecordingFactory {
        pub(crate) rows: usize,
        pub(crate) cols: usize,
        pub(crate) builds: AtomicUsize,
        pub(crate) seen: Arc<Mutex<Vec<Vec<f64>>>>,
    }

    struct RecordingTransform {
        rows: usize,
        cols: usize,
        seen: Arc<Mutex<Vec<Vec<f64>>>>,
    }

    impl TransformFactory for RecordingFactory {
        fn build(&self, _energy_ev: f64) -> RsmResult<Arc<dyn ScatteringTransform>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(RecordingTransform {
                rows: self.rows,
                cols: self.cols,
                seen: Arc::clone(&self.seen),
            }))
        }

        fn frame_shape(&self) -> (usize, usize) {
            (self.rows, self.cols)
        }
    }

    impl ScatteringTransform for RecordingTransform {
        fn pixel_hkl(&self, angles: &[f64], _ub: Option<&Matrix3<f64>>) -> RsmResult<Vec<f64>> {
            self.seen
                .lock()
                .expect("recording lock")
                .push(angles.to_vec());
            let pixels = self.rows * self.cols;
            let mut values = vec![0.0; 3 * pixels];
            for row in 0..self.rows {
                for col in 0..self.cols {
                    let pixel = row * self.cols + col;
                    values[pixel] = row as f64;
                    values[pixels + pixel] = col as f64;
                    values[2 * pixels + pixel] = angles[0];
                }
            }
            Ok(values)
        }
    }

    pub(crate) fn named_geometry(sample: &[&str], detector: &[&str]) -> GeometryConfig {
        let circles = |names: &[&str]| {
            names
                .iter()
                .map(|name| CircleAxis::new(*name, AxisDirection::ZMinus))
                .collect::<Vec<_>>()
        };
        GeometryConfig::new(
            InstrumentGeometry {
                sample_circles: circles(sample),
                detector_circles: circles(detector),
                primary_beam_direction: Vector3::y(),
                inplane_reference_direction: Vector3::y(),
                sample_surface_normal_direction: Vector3::z(),
            },
            DetectorGeometry {
                id: "stub".to_string(),
                pixel_direction_1: AxisDirection::ZMinus,
                pixel_direction_2: AxisDirection::XPlus,
                center_pixel: [0.5, 0.5],
                pixel_count: [2, 2],
                size: [0.2, 0.2],
                distance: 100.0,
            },
        )
        .expect("stub geometry is valid")
    }

    #[test]
    fn transform_receives_sample_then_detector_angles() {
        let geometry = named_geometry(&["outer", "inner"], &["arm"]);
        let log = SpecLog::parse(
            "#O0 arm  outer  inner\n#S 1 ascan\n#U 8\n#P0 30 10 20\n#L zz  inner\n9 21\n9 22\n",
        )
        .expect("log should parse");
        let metadata = AngleResolver::new(&geometry, "Energy")
            .resolve(log.scan(1).expect("scan 1"))
            .expect("metadata resolves");
        assert_eq!(metadata.angle_names, vec!["outer", "inner", "arm"]);

        let factory = Arc::new(RecordingFactory {
            rows: 2,
            cols: 2,
            ..RecordingFactory::default()
        });
        let mapper = CoordinateMapper::new(factory.clone(), MissingAnglePolicy::Reject);
        let volume = mapper.map_scan(&metadata).expect("mapping succeeds");

        let mut seen = factory.seen.lock().expect("recording lock").clone();
        seen.sort_by(|a, b| a[1].total_cmp(&b[1]));
        assert_eq!(seen, vec![vec![10.0, 21.0, 30.0], vec![10.0, 22.0, 30.0]]);
        assert_eq!(volume.shape(), (2, 2, 2));
        assert_eq!(volume.hkl(1, 1, 0), [1.0, 0.0, 10.0]);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn energy_changes_rebuild_the_transform() {
        let geometry = named_geometry(&["th"], &["tth"]);
        let log = SpecLog::parse(
            "#S 2 escan\n#L Energy  th  tth\n8 1 2\n8 1 2\n9 1 2\n8 1 2\n",
        )
        .expect("log should parse");
        let metadata = AngleResolver::new(&geometry, "Energy")
            .resolve(log.scan(2).expect("scan 2"))
            .expect("metadata resolves");

        let factory = Arc::new(RecordingFactory {
            rows: 1,
            cols: 1,
            ..RecordingFactory::default()
        });
        let mapper = CoordinateMapper::new(factory.clone(), MissingAnglePolicy::Reject);
        mapper.map_scan(&metadata).expect("mapping succeeds");
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn missing_angles_follow_the_configured_policy() {
        let geometry = named_geometry(&["th"], &["tth"]);
        let log = SpecLog::parse("#S 3 ascan\n#U 8\n#L th\n5\n").expect("log should parse");
        let metadata = AngleResolver::new(&geometry, "Energy")
            .resolve(log.scan(3).expect("scan 3"))
            .expect("metadata resolves");
        assert_eq!(metadata.missing_angles, vec!["tth"]);

        let factory = Arc::new(RecordingFactory {
            rows: 1,
            cols: 1,
            ..RecordingFactory::default()
        });
        let strict = CoordinateMapper::new(factory.clone(), MissingAnglePolicy::Reject);
        let error = strict.map_scan(&metadata).expect_err("missing tth is rejected");
        assert_eq!(error.kind(), RsmErrorKind::MetadataParse);
        assert_eq!(error.placeholder(), "META.MISSING_ANGLE");
        assert!(error.message().contains("tth"));

        let lenient = CoordinateMapper::new(factory.clone(), MissingAnglePolicy::ZeroDefault);
        lenient.map_scan(&metadata).expect("zero default maps");
        let seen = factory.seen.lock().expect("recording lock").clone();
        assert_eq!(seen, vec![vec![5.0, 0.0]]);
    }

    #[test]
    fn selected_points_keep_their_scan_indices() {
        let geometry = named_geometry(&["th"], &["tth"]);
        let log = SpecLog::parse("#S 4 ascan\n#U 8\n#L th  tth\n1 0\n2 0\n3 0\n")
            .expect("log should parse");
        let metadata = AngleResolver::new(&geometry, "Energy")
            .resolve(log.scan(4).expect("scan 4"))
            .expect("metadata resolves");

        let factory = Arc::new(RecordingFactory {
            rows: 1,
            cols: 1,
            ..RecordingFactory::default()
        });
        let mapper = CoordinateMapper::new(factory, MissingAnglePolicy::Reject);
        let volume = mapper.map_points(&metadata, &[0, 2]).expect("mapping succeeds");
        assert_eq!(volume.point_indices(), [0, 2]);
        assert_eq!(volume.hkl(1, 0, 0), [0.0, 0.0, 3.0]);

        let error = mapper
            .map_points(&metadata, &[5])
            .expect_err("point 5 does not exist");
        assert_eq!(error.placeholder(), "META.POINT_RANGE");
    }

    #[test]
    fn physical_mapping_rejects_scans_without_energy() {
        let geometry = Arc::new(named_geometry(&["th"], &["tth"]));
        let log = SpecLog::parse("#S 5 ascan\n#L th  tth\n1 2\n").expect("log should parse");
        let metadata = AngleResolver::new(&geometry, "Energy")
            .resolve(log.scan(5).expect("scan 5"))
            .expect("metadata resolves");

        let mapper = CoordinateMapper::for_geometry(geometry, MissingAnglePolicy::Reject);
        let error = mapper.map_scan(&metadata).expect_err("energy 0 fails");
        assert_eq!(error.placeholder(), "META.ENERGY");
    }
}
