use super::loader::{Frame, FrameLoader};
use super::normalizer::Normalizer;
use crate::domain::{RsmError, RsmResult};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::warn;

/// Normalized intensities indexed `[point][row][col]`. Layers are kept only
/// for the scan points listed in `point_indices`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrameStack {
    point_indices: Vec<usize>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl RawFrameStack {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            point_indices: Vec::new(),
            rows,
            cols,
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, point: usize, frame: &Frame) -> RsmResult<()> {
        if (frame.rows, frame.cols) != (self.rows, self.cols) {
            return Err(RsmError::scan_data_missing(
                "DATA.FRAME_SHAPE",
                format!(
                    "frame for point {} is {}x{}, expected {}x{}",
                    point, frame.rows, frame.cols, self.rows, self.cols
                ),
            ));
        }
        self.point_indices.push(point);
        self.data.extend_from_slice(&frame.data);
        Ok(())
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.point_indices.len(), self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.point_indices.is_empty()
    }

    pub fn point_indices(&self) -> &[usize] {
        &self.point_indices
    }

    pub fn frame(&self, layer: usize) -> &[f64] {
        let size = self.rows * self.cols;
        &self.data[layer * size..(layer + 1) * size]
    }

    pub fn value(&self, layer: usize, row: usize, col: usize) -> f64 {
        self.data[(layer * self.rows + row) * self.cols + col]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Result of loading one scan's frames: the stack plus one warning per
/// dropped point.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFrames {
    pub stack: RawFrameStack,
    pub warnings: Vec<RsmError>,
}

/// Loads and normalizes `frames[i]` as scan point `i`.
pub fn load_frame_stack(
    frames: &[PathBuf],
    point_count: usize,
    expected_shape: Option<(usize, usize)>,
    loader: &dyn FrameLoader,
    normalizer: &Normalizer,
) -> RsmResult<LoadedFrames> {
    if point_count == 0 {
        return Err(RsmError::scan_data_missing(
            "DATA.EMPTY_SCAN",
            "scan has no data points",
        ));
    }
    if frames.len() != point_count {
        return Err(RsmError::scan_data_missing(
            "DATA.FRAME_COUNT",
            format!(
                "found {} frame files for {} scan points",
                frames.len(),
                point_count
            ),
        ));
    }

    let normalized = frames
        .par_iter()
        .enumerate()
        .map(|(point, path)| {
            let frame = loader.load(path)?;
            Ok((point, normalizer.normalize(point, &frame)))
        })
        .collect::<RsmResult<Vec<_>>>()?;

    let (rows, cols) = expected_shape
        .or_else(|| {
            normalized
                .iter()
                .find_map(|(_, result)| result.as_ref().ok())
                .map(|frame| (frame.rows, frame.cols))
        })
        .unwrap_or((0, 0));

    let mut stack = RawFrameStack::new(rows, cols);
    let mut warnings = Vec::new();
    for (point, result) in normalized {
        match result {
            Ok(frame) => stack.push(point, &frame)?,
            Err(error) => {
                warn!(point, placeholder = error.placeholder(), "{}", error.message());
                warnings.push(error);
            }
        }
    }

    if stack.is_empty() {
        return Err(RsmError::scan_data_missing(
            "DATA.ALL_POINTS_DROPPED",
            format!("all {} scan points were dropped during normalization", point_count),
        ));
    }
    Ok(LoadedFrames { stack, warnings })
}

#[cfg(test)]
mod tests {
    use super::{RawFrameStack, load_frame_stack};
    use crate::domain::{RsmErrorKind, RsmResult};
    use crate::normalize::{Frame, FrameLoader, NormalizationFactors, Normalizer};
    use std::path::{Path, PathBuf};

    /// Serves frames whose every pixel equals the trailing number in the
    /// file name.
    struct ConstantLoader {
        rows: usize,
        cols: usize,
    }

    impl FrameLoader for ConstantLoader {
        fn load(&self, path: &Path) -> RsmResult<Frame> {
            let value = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.rsplit('_').next())
                .and_then(|digits| digits.parse::<f64>().ok())
                .unwrap_or(0.0);
            Ok(Frame::filled(self.rows, self.cols, value))
        }
    }

    fn paths(count: usize) -> Vec<PathBuf> {
        (1..=count)
            .map(|index| PathBuf::from(format!("f_{}.tif", index)))
            .collect()
    }

    #[test]
    fn zero_monitor_points_are_dropped_with_a_warning() {
        let normalizer = Normalizer::new(NormalizationFactors::new(
            vec![200_000.0, 0.0, 400_000.0],
            vec![1.0, 1.0, 0.5],
            200_000.0,
        ));
        let loaded = load_frame_stack(
            &paths(3),
            3,
            Some((2, 2)),
            &ConstantLoader { rows: 2, cols: 2 },
            &normalizer,
        )
        .expect("stack loads");

        assert_eq!(loaded.stack.shape(), (2, 2, 2));
        assert_eq!(loaded.stack.point_indices(), [0, 2]);
        assert_eq!(loaded.stack.frame(0), [1.0; 4]);
        assert_eq!(loaded.stack.value(1, 1, 1), 3.0);
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].kind(), RsmErrorKind::Normalization);
    }

    #[test]
    fn frame_count_must_match_point_count() {
        let error = load_frame_stack(
            &paths(2),
            3,
            None,
            &ConstantLoader { rows: 1, cols: 1 },
            &Normalizer::disabled(),
        )
        .expect_err("two frames for three points");
        assert_eq!(error.kind(), RsmErrorKind::ScanDataMissing);
        assert_eq!(error.placeholder(), "DATA.FRAME_COUNT");
    }

    #[test]
    fn frames_must_match_the_detector_shape() {
        let error = load_frame_stack(
            &paths(1),
            1,
            Some((2, 2)),
            &ConstantLoader { rows: 3, cols: 2 },
            &Normalizer::disabled(),
        )
        .expect_err("3x2 frame on a 2x2 detector");
        assert_eq!(error.placeholder(), "DATA.FRAME_SHAPE");
    }

    #[test]
    fn dropping_every_point_fails_the_load() {
        let normalizer =
            Normalizer::new(NormalizationFactors::new(vec![0.0], vec![1.0], 200_000.0));
        let error = load_frame_stack(
            &paths(1),
            1,
            None,
            &ConstantLoader { rows: 1, cols: 1 },
            &normalizer,
        )
        .expect_err("only point dropped");
        assert_eq!(error.placeholder(), "DATA.ALL_POINTS_DROPPED");
    }

    #[test]
    fn stack_rejects_mismatched_frames() {
        let mut stack = RawFrameStack::new(1, 2);
        stack
            .push(0, &Frame::filled(1, 2, 1.0))
            .expect("matching frame");
        assert!(stack.push(1, &Frame::filled(2, 1, 1.0)).is_err());
        assert_eq!(stack.shape(), (1, 1, 2));
    }
}
