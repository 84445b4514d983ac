pub mod smoothing;

pub use smoothing::{NoiseFilter, moving_average, weighted_average};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn stable_weighted_sum(values: &[f64], weights: &[f64]) -> Option<f64> {
    if values.len() != weights.len() {
        return None;
    }

    let mut sum = 0.0;
    let mut correction = 0.0;
    for (&value, &weight) in values.iter().zip(weights) {
        kahan_add(&mut sum, &mut correction, value * weight);
    }

    Some(sum)
}

/// Largest finite value, or `0.0` for an empty or all-NaN slice.
pub fn max_value(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(None, |best: Option<f64>, value| {
            Some(best.map_or(value, |best| best.max(value)))
        })
        .unwrap_or(0.0)
}

pub fn max_abs_value(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(0.0, |best, value| best.max(value.abs()))
}

/// Forward difference `x[i + 1] - x[i]`; the final sample is zero.
pub fn first_derivative(values: &[f64]) -> Vec<f64> {
    let mut derivative = vec![0.0; values.len()];
    for (index, window) in values.windows(2).enumerate() {
        derivative[index] = window[1] - window[0];
    }
    derivative
}

/// Central second difference `x[i + 1] - 2 x[i] + x[i - 1]`; both end samples are zero.
pub fn second_derivative(values: &[f64]) -> Vec<f64> {
    let mut derivative = vec![0.0; values.len()];
    for (offset, window) in values.windows(3).enumerate() {
        derivative[offset + 1] = window[2] - 2.0 * window[1] + window[0];
    }
    derivative
}

#[cfg(test)]
mod tests {
    use super::{
        first_derivative, max_abs_value, max_value, second_derivative, stable_sum,
        stable_weighted_sum,
    };

    #[test]
    fn kahan_sums_recover_rounding_loss() {
        let tenths = [0.1; 10];
        assert_ne!(tenths.iter().sum::<f64>(), 1.0);
        assert_eq!(stable_sum(&tenths), 1.0);
        assert_eq!(stable_sum(&[]), 0.0);
    }

    #[test]
    fn weighted_sums_require_matching_lengths() {
        assert!(stable_weighted_sum(&[3.0], &[1.0, 1.0]).is_none());
        let dot = stable_weighted_sum(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).expect("dot product");
        assert!((dot - 10.0).abs() < 1.0e-12);
    }

    #[test]
    fn extrema_ignore_non_finite_samples() {
        assert_eq!(max_value(&[]), 0.0);
        assert_eq!(max_value(&[-3.0, f64::NAN, -1.0]), -1.0);
        assert_eq!(max_abs_value(&[2.0, -5.0, f64::INFINITY]), 5.0);
    }

    #[test]
    fn derivatives_use_forward_and_central_differences() {
        let values = [0.0, 1.0, 4.0, 9.0, 16.0];
        assert_eq!(first_derivative(&values), vec![1.0, 3.0, 5.0, 7.0, 0.0]);
        assert_eq!(second_derivative(&values), vec![0.0, 2.0, 2.0, 2.0, 0.0]);
        assert!(first_derivative(&[]).is_empty());
        assert_eq!(second_derivative(&[1.0, 2.0]), vec![0.0, 0.0]);
    }
}
