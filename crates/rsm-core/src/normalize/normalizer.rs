use super::loader::Frame;
use crate::common::NormalizationConfig;
use crate::domain::{RsmError, RsmResult};
use crate::metadata::SpecScan;

/// Per-point monitor readings and attenuation factors of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationFactors {
    monitor_readings: Vec<f64>,
    filter_factors: Vec<f64>,
    monitor_scale: f64,
}

impl NormalizationFactors {
    pub fn new(monitor_readings: Vec<f64>, filter_factors: Vec<f64>, monitor_scale: f64) -> Self {
        Self {
            monitor_readings,
            filter_factors,
            monitor_scale,
        }
    }

    pub fn from_scan(scan: &SpecScan, config: &NormalizationConfig) -> RsmResult<Self> {
        let monitor_readings = required_column(scan, &config.monitor_column)?;
        let filter_factors = required_column(scan, &config.filter_column)?;
        Ok(Self::new(monitor_readings, filter_factors, config.monitor_scale))
    }

    /// `monitor / scale * filter` for one point, or `None` past the table end.
    pub fn divisor(&self, point: usize) -> Option<f64> {
        let monitor = self.monitor_readings.get(point)? / self.monitor_scale;
        let filter = self.filter_factors.get(point)?;
        Some(monitor * filter)
    }
}

fn required_column(scan: &SpecScan, label: &str) -> RsmResult<Vec<f64>> {
    scan.column(label)?.ok_or_else(|| {
        RsmError::metadata_parse(
            "META.NORMALIZATION_COLUMN",
            format!("scan {} has no '{}' column", scan.number(), label),
        )
    })
}

/// Divides each frame by its point's monitor and attenuation factors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalizer {
    factors: Option<NormalizationFactors>,
}

impl Normalizer {
    pub fn new(factors: NormalizationFactors) -> Self {
        Self {
            factors: Some(factors),
        }
    }

    /// Passes frames through unchanged.
    pub fn disabled() -> Self {
        Self { factors: None }
    }

    pub fn from_scan(scan: &SpecScan, config: &NormalizationConfig) -> RsmResult<Self> {
        if config.enabled {
            NormalizationFactors::from_scan(scan, config).map(Self::new)
        } else {
            Ok(Self::disabled())
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.factors.is_some()
    }

    pub fn normalize(&self, point: usize, frame: &Frame) -> RsmResult<Frame> {
        let Some(factors) = &self.factors else {
            return Ok(frame.clone());
        };
        let divisor = factors.divisor(point).ok_or_else(|| {
            RsmError::normalization(
                "NORM.MISSING_FACTOR",
                format!("no monitor or filter value for point {}", point),
            )
        })?;
        if divisor == 0.0 || !divisor.is_finite() {
            return Err(RsmError::normalization(
                "NORM.ZERO_DIVISOR",
                format!(
                    "point {} dropped: monitor times filter is {}",
                    point, divisor
                ),
            ));
        }

        Ok(Frame {
            rows: frame.rows,
            cols: frame.cols,
            data: frame.data.iter().map(|value| value / divisor).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{NormalizationFactors, Normalizer};
    use crate::common::NormalizationConfig;
    use crate::domain::RsmErrorKind;
    use crate::metadata::SpecLog;
    use crate::normalize::Frame;

    #[test]
    fn ones_frame_normalizes_to_inverse_monitor_times_filter() {
        let (m, f) = (2.5, 0.2);
        let normalizer = Normalizer::new(NormalizationFactors::new(
            vec![200_000.0 * m],
            vec![f],
            200_000.0,
        ));
        let normalized = normalizer
            .normalize(0, &Frame::filled(4, 3, 1.0))
            .expect("normalization succeeds");

        let expected = 1.0 / (m * f);
        assert_eq!((normalized.rows, normalized.cols), (4, 3));
        assert!(
            normalized
                .data
                .iter()
                .all(|value| (value - expected).abs() < 1.0e-12)
        );
    }

    #[test]
    fn zero_filter_is_a_normalization_error() {
        let normalizer =
            Normalizer::new(NormalizationFactors::new(vec![1.0], vec![0.0], 200_000.0));
        let error = normalizer
            .normalize(0, &Frame::filled(1, 1, 5.0))
            .expect_err("zero filter");
        assert_eq!(error.kind(), RsmErrorKind::Normalization);
        assert_eq!(error.placeholder(), "NORM.ZERO_DIVISOR");
    }

    #[test]
    fn factors_come_from_configured_columns() {
        let log = SpecLog::parse("#S 1 ascan\n#L I0  att  Ion_Ch_2\n100 0.5 7\n").expect("log");
        let scan = log.scan(1).expect("scan 1");
        let config = NormalizationConfig {
            monitor_column: "I0".to_string(),
            filter_column: "att".to_string(),
            monitor_scale: 100.0,
            ..NormalizationConfig::default()
        };

        let normalizer = Normalizer::from_scan(scan, &config).expect("columns exist");
        let frame = normalizer
            .normalize(0, &Frame::filled(1, 1, 1.0))
            .expect("normalization succeeds");
        assert_eq!(frame.data, vec![2.0]);

        let error = Normalizer::from_scan(scan, &NormalizationConfig::default())
            .expect_err("transm column is absent");
        assert_eq!(error.kind(), RsmErrorKind::MetadataParse);
        assert_eq!(error.placeholder(), "META.NORMALIZATION_COLUMN");
    }

    #[test]
    fn disabled_normalizer_passes_frames_through() {
        let log = SpecLog::parse("#S 1 ascan\n#L a\n1\n").expect("log");
        let config = NormalizationConfig {
            enabled: false,
            ..NormalizationConfig::default()
        };
        let normalizer =
            Normalizer::from_scan(log.scan(1).expect("scan 1"), &config).expect("disabled");
        assert!(!normalizer.is_enabled());
        let frame = Frame::filled(1, 2, 3.0);
        assert_eq!(normalizer.normalize(0, &frame).expect("pass through"), frame);
    }
}
