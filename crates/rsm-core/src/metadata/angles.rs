use super::spec_file::SpecScan;
use crate::common::constants::{
    DEFAULT_FILTER_COLUMN, DEFAULT_MONITOR_COLUMN, ENERGY_HEADER_MARKER, KEV_TO_EV, UB_HEADER_KEY,
};
use crate::domain::{RsmError, RsmResult};
use crate::geometry::GeometryConfig;
use nalgebra::Matrix3;
use tracing::debug;

/// Everything the coordinate mapper needs from one scan of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMetadata {
    pub scan_number: u32,
    pub version: u64,
    /// Sample-circle names followed by detector-circle names.
    pub angle_names: Vec<String>,
    /// Header energy in eV, 0 when the scan has no `#U` record.
    pub energy_ev: f64,
    /// Per-point energy in eV.
    pub point_energies: Vec<f64>,
    pub ub: Option<Matrix3<f64>>,
    /// `[point][angle]`, columns ordered like `angle_names`.
    pub angles: Vec<Vec<f64>>,
    /// Angles that had neither a positioner value nor a data column; their
    /// entries in `angles` are 0.
    pub missing_angles: Vec<String>,
    /// Raw monitor counts per point, `None` when the column is absent.
    pub monitor_readings: Option<Vec<f64>>,
    /// Attenuation factors per point, `None` when the column is absent.
    pub filter_factors: Option<Vec<f64>>,
    pub point_count: usize,
}

impl ScanMetadata {
    pub fn point_angles(&self, point: usize) -> Option<&[f64]> {
        self.angles.get(point).map(Vec::as_slice)
    }
}

/// Pulls per-point goniometer angles, energy and the UB matrix out of a scan.
#[derive(Debug, Clone)]
pub struct AngleResolver {
    angle_names: Vec<String>,
    energy_column: String,
    monitor_column: String,
    filter_column: String,
}

impl AngleResolver {
    pub fn new(geometry: &GeometryConfig, energy_column: impl Into<String>) -> Self {
        Self {
            angle_names: geometry.angle_names(),
            energy_column: energy_column.into(),
            monitor_column: DEFAULT_MONITOR_COLUMN.to_string(),
            filter_column: DEFAULT_FILTER_COLUMN.to_string(),
        }
    }

    pub fn with_normalization_columns(
        mut self,
        monitor_column: impl Into<String>,
        filter_column: impl Into<String>,
    ) -> Self {
        self.monitor_column = monitor_column.into();
        self.filter_column = filter_column.into();
        self
    }

    pub fn angle_names(&self) -> &[String] {
        &self.angle_names
    }

    pub fn resolve(&self, scan: &SpecScan) -> RsmResult<ScanMetadata> {
        let point_count = scan.data_lines();
        let positioners = scan.positioners()?;

        let mut angles = vec![vec![0.0; self.angle_names.len()]; point_count];
        let mut missing_angles = Vec::new();
        for (index, name) in self.angle_names.iter().enumerate() {
            if let Some(values) = scan.column(name)? {
                for (row, value) in angles.iter_mut().zip(values) {
                    row[index] = value;
                }
            } else if let Some(value) = positioners.get(name) {
                for row in angles.iter_mut() {
                    row[index] = *value;
                }
            } else {
                missing_angles.push(name.clone());
            }
        }

        let energy_ev = header_energy(scan)?;
        let point_energies = match scan.column(&self.energy_column)? {
            Some(values) => values.into_iter().map(|kev| kev * KEV_TO_EV).collect(),
            None => vec![energy_ev; point_count],
        };

        Ok(ScanMetadata {
            scan_number: scan.number(),
            version: scan.version(),
            angle_names: self.angle_names.clone(),
            energy_ev,
            point_energies,
            ub: ub_matrix(scan)?,
            angles,
            missing_angles,
            monitor_readings: scan.column(&self.monitor_column)?,
            filter_factors: scan.column(&self.filter_column)?,
            point_count,
        })
    }
}

fn header_energy(scan: &SpecScan) -> RsmResult<f64> {
    let Some(line) = scan.header_line(ENERGY_HEADER_MARKER) else {
        return Ok(0.0);
    };
    let token = line.split_whitespace().nth(1).ok_or_else(|| {
        RsmError::metadata_parse(
            "META.ENERGY",
            format!("scan {} energy record '{}' has no value", scan.number(), line),
        )
    })?;
    let kev = token.parse::<f64>().map_err(|_| {
        RsmError::metadata_parse(
            "META.ENERGY",
            format!(
                "scan {} energy value '{}' is not a number",
                scan.number(),
                token
            ),
        )
    })?;
    Ok(kev * KEV_TO_EV)
}

fn ub_matrix(scan: &SpecScan) -> RsmResult<Option<Matrix3<f64>>> {
    let Some(values) = scan.geometry_values(UB_HEADER_KEY)? else {
        return Ok(None);
    };
    if values.len() != 9 {
        return Err(RsmError::metadata_parse(
            "META.UB_MATRIX",
            format!(
                "scan {} #{} must hold 9 values, got {}",
                scan.number(),
                UB_HEADER_KEY,
                values.len()
            ),
        ));
    }
    if values.iter().all(|value| *value == 0.0) {
        debug!(scan = scan.number(), "UB record is all zeros; using the sample frame");
        return Ok(None);
    }
    Ok(Some(Matrix3::from_row_slice(&values)))
}

#[cfg(test)]
mod tests {
    use super::AngleResolver;
    use crate::domain::RsmErrorKind;
    use crate::geometry::GeometryConfig;
    use crate::geometry::test_support::{SINGLE_DETECTOR_CONFIG, SIX_CIRCLE_INSTRUMENT};
    use crate::metadata::SpecLog;
    use crate::metadata::spec_file::tests::TWO_SCAN_LOG;
    use nalgebra::Matrix3;

    fn resolver() -> AngleResolver {
        let geometry = GeometryConfig::from_sources(SIX_CIRCLE_INSTRUMENT, SINGLE_DETECTOR_CONFIG)
            .expect("geometry should build");
        AngleResolver::new(&geometry, "Energy")
    }

    #[test]
    fn data_columns_override_positioner_values() {
        let log = SpecLog::parse(TWO_SCAN_LOG).expect("log should parse");
        let metadata = resolver()
            .resolve(log.scan(1).expect("scan 1 exists"))
            .expect("metadata resolves");

        assert_eq!(
            metadata.angle_names,
            vec!["mu", "eta", "chi", "phi", "nu", "delta"]
        );
        assert_eq!(metadata.point_count, 3);
        assert_eq!(metadata.angles[0], vec![0.5, 10.0, 90.0, 0.0, 0.0, 20.0]);
        assert_eq!(metadata.angles[2][1], 12.0);
        assert!(metadata.missing_angles.is_empty());
        assert_eq!(metadata.energy_ev, 11_500.0);
        assert_eq!(metadata.point_energies, vec![11_500.0; 3]);
        assert_eq!(
            metadata.monitor_readings,
            Some(vec![200_000.0, 400_000.0, 0.0])
        );
        assert_eq!(metadata.filter_factors, Some(vec![1.0, 0.5, 1.0]));
        assert_eq!(
            metadata.ub,
            Some(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0))
        );
    }

    #[test]
    fn missing_angles_are_recorded_at_zero() {
        let log = SpecLog::parse(
            "#O0 mu  eta  chi\n#S 5 ascan\n#U 10\n#P0 1 2 3\n#L Energy  phi\n10 4\n10.5 5\n",
        )
        .expect("log should parse");
        let metadata = resolver()
            .resolve(log.scan(5).expect("scan 5 exists"))
            .expect("metadata resolves");

        assert_eq!(metadata.missing_angles, vec!["nu", "delta"]);
        assert_eq!(metadata.angles[1], vec![1.0, 2.0, 3.0, 5.0, 0.0, 0.0]);
        assert_eq!(metadata.point_energies, vec![10_000.0, 10_500.0]);
        assert_eq!(metadata.ub, None);
    }

    #[test]
    fn malformed_ub_record_is_a_metadata_error() {
        let log = SpecLog::parse("#S 6 ascan\n#G3 1 0 0 0 1 0 0 0\n#L a\n1\n")
            .expect("log should parse");
        let error = resolver()
            .resolve(log.scan(6).expect("scan 6 exists"))
            .expect_err("G3 with 8 values");
        assert_eq!(error.kind(), RsmErrorKind::MetadataParse);
        assert_eq!(error.placeholder(), "META.UB_MATRIX");
    }

    #[test]
    fn unreadable_energy_is_a_metadata_error() {
        let log = SpecLog::parse("#S 7 ascan\n#U high\n#L a\n1\n").expect("log should parse");
        let error = resolver()
            .resolve(log.scan(7).expect("scan 7 exists"))
            .expect_err("non-numeric energy");
        assert_eq!(error.placeholder(), "META.ENERGY");
    }
}
