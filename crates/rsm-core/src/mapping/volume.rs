use crate::domain::HklAxis;
use crate::numerics::finite_bounds;

/// Per-pixel HKL coordinates, indexed `[point][row][col][coord]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReciprocalSpaceVolume {
    point_indices: Vec<usize>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl ReciprocalSpaceVolume {
    /// `data` must already be in `[point][row][col][coord]` order.
    pub(crate) fn new(point_indices: Vec<usize>, rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), point_indices.len() * rows * cols * 3);
        Self {
            point_indices,
            rows,
            cols,
            data,
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.point_indices.len(), self.rows, self.cols)
    }

    pub fn point_count(&self) -> usize {
        self.point_indices.len()
    }

    /// Scan-point index of each layer.
    pub fn point_indices(&self) -> &[usize] {
        &self.point_indices
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn hkl(&self, point: usize, row: usize, col: usize) -> [f64; 3] {
        let base = ((point * self.rows + row) * self.cols + col) * 3;
        [self.data[base], self.data[base + 1], self.data[base + 2]]
    }

    /// Every sample's coordinate on one axis, in storage order.
    pub fn axis_values(&self, axis: HklAxis) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().skip(axis.index()).step_by(3).copied()
    }

    pub fn axis_bounds(&self, axis: HklAxis) -> Option<(f64, f64)> {
        finite_bounds(self.axis_values(axis))
    }
}

/// Reorders per-point `[coord][row][col]` maps, stacked point after point,
/// into `[point][row][col][coord]`.
pub fn coord_major_to_pixel_major(
    stacked: &[f64],
    points: usize,
    rows: usize,
    cols: usize,
) -> Vec<f64> {
    let pixels = rows * cols;
    let mut out = vec![0.0; stacked.len()];
    for point in 0..points {
        let source = &stacked[point * 3 * pixels..(point + 1) * 3 * pixels];
        let target = &mut out[point * 3 * pixels..(point + 1) * 3 * pixels];
        for pixel in 0..pixels {
            for coord in 0..3 {
                target[pixel * 3 + coord] = source[coord * pixels + pixel];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ReciprocalSpaceVolume, coord_major_to_pixel_major};
    use crate::domain::HklAxis;

    /// Encodes (point, coord, row, col) into one distinguishable value.
    fn tag(point: usize, coord: usize, row: usize, col: usize) -> f64 {
        (point * 1000 + coord * 100 + row * 10 + col) as f64
    }

    #[test]
    fn layout_moves_coord_to_the_last_index() {
        let (points, rows, cols) = (2, 3, 4);
        let mut stacked = Vec::new();
        for point in 0..points {
            for coord in 0..3 {
                for row in 0..rows {
                    for col in 0..cols {
                        stacked.push(tag(point, coord, row, col));
                    }
                }
            }
        }

        let volume = ReciprocalSpaceVolume::new(
            vec![0, 1],
            rows,
            cols,
            coord_major_to_pixel_major(&stacked, points, rows, cols),
        );
        for point in 0..points {
            for row in 0..rows {
                for col in 0..cols {
                    assert_eq!(
                        volume.hkl(point, row, col),
                        [
                            tag(point, 0, row, col),
                            tag(point, 1, row, col),
                            tag(point, 2, row, col)
                        ]
                    );
                }
            }
        }
        assert_eq!(volume.as_slice()[3], tag(0, 0, 0, 1));
    }

    #[test]
    fn axis_bounds_cover_every_sample() {
        let volume = ReciprocalSpaceVolume::new(
            vec![4],
            1,
            2,
            vec![0.1, -1.0, 3.0, 0.2, 1.0, 2.0],
        );
        assert_eq!(volume.axis_bounds(HklAxis::H), Some((0.1, 0.2)));
        assert_eq!(volume.axis_bounds(HklAxis::K), Some((-1.0, 1.0)));
        assert_eq!(volume.axis_bounds(HklAxis::L), Some((2.0, 3.0)));
        assert_eq!(volume.point_indices(), [4]);
        assert_eq!(volume.shape(), (1, 1, 2));
    }
}
