//! Small numeric helpers shared by the mapper and the gridder.

/// Compensated running sum, so that accumulating millions of detector
/// samples into one grid node does not lose low-order bits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StableSum {
    sum: f64,
    correction: f64,
}

impl StableSum {
    pub fn add(&mut self, value: f64) {
        let corrected = value - self.correction;
        let next = self.sum + corrected;
        self.correction = (next - self.sum) - corrected;
        self.sum = next;
    }

    pub fn value(&self) -> f64 {
        self.sum
    }
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = StableSum::default();
    for &value in values {
        sum.add(value);
    }
    sum.value()
}

/// `count` evenly spaced values from `start` to `stop`; the last element is
/// exactly `stop`.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|index| {
                    if index == count - 1 {
                        stop
                    } else {
                        start + step * index as f64
                    }
                })
                .collect()
        }
    }
}

/// Minimum and maximum of the finite values, or `None` when there are none.
pub fn finite_bounds<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .filter(|value| value.is_finite())
        .fold(None, |bounds, value| match bounds {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
}

#[cfg(test)]
mod tests {
    use super::{finite_bounds, linspace, stable_sum};

    #[test]
    fn linspace_hits_both_endpoints() {
        let values = linspace(-1.0, 0.3, 14);
        assert_eq!(values.len(), 14);
        assert_eq!(values[0], -1.0);
        assert_eq!(values[13], 0.3);
        let step = values[1] - values[0];
        for pair in values.windows(2) {
            assert!((pair[1] - pair[0] - step).abs() <= 1.0e-12);
        }
    }

    #[test]
    fn linspace_handles_short_lengths() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 5.0, 1), vec![2.0]);
        assert_eq!(linspace(2.0, 5.0, 2), vec![2.0, 5.0]);
    }

    #[test]
    fn stable_sum_recovers_small_terms() {
        let mut values = vec![1.0e16];
        values.extend(std::iter::repeat_n(1.0, 1000));
        values.push(-1.0e16);
        assert_eq!(stable_sum(&values), 1000.0);
    }

    #[test]
    fn finite_bounds_skip_non_finite_values() {
        let bounds = finite_bounds([3.0, f64::NAN, -2.0, f64::INFINITY, 7.5]);
        assert_eq!(bounds, Some((-2.0, 7.5)));
        assert_eq!(finite_bounds([f64::NAN]), None);
    }
}
