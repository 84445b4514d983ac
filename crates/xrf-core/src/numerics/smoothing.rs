//! Local-average noise filters used ahead of peak detection.

/// Noise filter applied to a spectrum before derivative analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseFilter {
    /// Triangular-weighted average over `2 * reach + 1` samples.
    WeightedAverage { reach: usize },
    /// Unweighted average over `2 * reach + 1` samples.
    MovingAverage { reach: usize },
}

impl NoiseFilter {
    pub fn apply(self, values: &[f64]) -> Vec<f64> {
        match self {
            Self::WeightedAverage { reach } => weighted_average(values, reach),
            Self::MovingAverage { reach } => moving_average(values, reach),
        }
    }

    /// Apply the filter `passes` times, feeding each output into the next pass.
    pub fn apply_repeated(self, values: &[f64], passes: usize) -> Vec<f64> {
        let mut smoothed = values.to_vec();
        for _ in 0..passes {
            smoothed = self.apply(&smoothed);
        }
        smoothed
    }
}

/// Each sample becomes the average of its neighbours within `reach`, weighted
/// `reach + 1 - |offset|`. Near the edges only in-range samples contribute and
/// the weights are renormalized, so a flat spectrum stays flat.
pub fn weighted_average(values: &[f64], reach: usize) -> Vec<f64> {
    local_average(values, reach, |offset| (reach + 1 - offset) as f64)
}

pub fn moving_average(values: &[f64], reach: usize) -> Vec<f64> {
    local_average(values, reach, |_| 1.0)
}

fn local_average(values: &[f64], reach: usize, weight: impl Fn(usize) -> f64) -> Vec<f64> {
    let len = values.len();
    let mut output = Vec::with_capacity(len);
    for index in 0..len {
        let start = index.saturating_sub(reach);
        let end = (index + reach).min(len.saturating_sub(1));

        let mut total = 0.0;
        let mut weights = 0.0;
        for (position, value) in values.iter().enumerate().take(end + 1).skip(start) {
            let w = weight(position.abs_diff(index));
            total += value * w;
            weights += w;
        }
        output.push(if weights > 0.0 { total / weights } else { 0.0 });
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{moving_average, weighted_average, NoiseFilter};

    #[test]
    fn flat_spectra_are_unchanged() {
        let flat = vec![5.0; 12];
        assert_eq!(weighted_average(&flat, 4), flat);
        assert_eq!(moving_average(&flat, 3), flat);
    }

    #[test]
    fn weighted_average_uses_triangular_weights() {
        let impulse = [0.0, 0.0, 4.0, 0.0, 0.0];
        let smoothed = weighted_average(&impulse, 1);
        assert!((smoothed[2] - 2.0).abs() < 1.0e-12);
        assert!((smoothed[1] - 1.0).abs() < 1.0e-12);
        assert!((smoothed[3] - 1.0).abs() < 1.0e-12);
        assert_eq!(smoothed[0], 0.0);
    }

    #[test]
    fn moving_average_renormalizes_at_edges() {
        let values = [3.0, 6.0, 9.0];
        let smoothed = moving_average(&values, 1);
        assert!((smoothed[0] - 4.5).abs() < 1.0e-12);
        assert!((smoothed[1] - 6.0).abs() < 1.0e-12);
        assert!((smoothed[2] - 7.5).abs() < 1.0e-12);
    }

    #[test]
    fn repeated_passes_compound() {
        let impulse = [0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0];
        let filter = NoiseFilter::MovingAverage { reach: 1 };
        let once = filter.apply(&impulse);
        let twice = filter.apply_repeated(&impulse, 2);
        assert_eq!(filter.apply_repeated(&impulse, 1), once);
        assert_eq!(once[1], 0.0);
        assert!((twice[1] - 1.0).abs() < 1.0e-12);
        assert!(filter.apply(&[]).is_empty());
    }
}
