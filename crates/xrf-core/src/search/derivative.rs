use crate::numerics::{NoiseFilter, max_abs_value, max_value, second_derivative};

pub const DERIVATIVE_SMOOTHING_REACH: usize = 8;
pub const DERIVATIVE_SMOOTHING_PASSES: usize = 3;
/// Non-negative second-derivative samples that separate two peaks.
pub const MIN_GAP_RUN: usize = 5;
/// Negative second-derivative samples a genuine dip must span.
pub const MIN_DIP_RUN: usize = 10;
/// Fraction of the largest |d2| a candidate's dip must reach.
pub const CURVATURE_THRESHOLD: f64 = 0.001;
pub const MIN_PEAK_SCORE: f64 = 0.001;
/// Largest half-width of the scoring window.
pub const MAX_SCORE_REACH: usize = 20;

/// Finds peaks as deep, isolated dips in the second derivative of a heavily
/// smoothed spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativePeakSearcher {
    pub smoothing: NoiseFilter,
    pub smoothing_passes: usize,
    pub min_gap_run: usize,
    pub min_dip_run: usize,
}

impl Default for DerivativePeakSearcher {
    fn default() -> Self {
        Self {
            smoothing: NoiseFilter::WeightedAverage {
                reach: DERIVATIVE_SMOOTHING_REACH,
            },
            smoothing_passes: DERIVATIVE_SMOOTHING_PASSES,
            min_gap_run: MIN_GAP_RUN,
            min_dip_run: MIN_DIP_RUN,
        }
    }
}

struct Curvature<'a> {
    data: &'a [f64],
    d2: &'a [f64],
    data_max: f64,
    d2_max: f64,
}

impl DerivativePeakSearcher {
    pub fn search(&self, spectrum: &[f64]) -> Vec<usize> {
        if spectrum.is_empty() {
            return Vec::new();
        }

        let data = self
            .smoothing
            .apply_repeated(spectrum, self.smoothing_passes);
        let d2 = second_derivative(&data);
        let curvature = Curvature {
            data: &data,
            d2: &d2,
            data_max: max_value(&data),
            d2_max: max_abs_value(&d2),
        };
        let threshold = curvature.d2_max * CURVATURE_THRESHOLD;

        let mut candidates = Vec::new();
        let mut nonnegative = 0_usize;
        let mut negative = 0_usize;
        let mut gap = false;
        let mut best_channel = 0_usize;
        let mut best_value = 0.0_f64;

        for (channel, &value) in d2.iter().enumerate() {
            if value >= 0.0 {
                if gap && negative >= self.min_dip_run && -best_value >= threshold {
                    let score = curvature.score(best_channel);
                    if score > MIN_PEAK_SCORE {
                        candidates.push((best_channel, score));
                        gap = false;
                    }
                }
                nonnegative += 1;
                negative = 0;
                best_channel = 0;
                best_value = 0.0;
                if nonnegative >= self.min_gap_run {
                    gap = true;
                }
            } else {
                negative += 1;
                nonnegative = 0;
                if value < best_value {
                    best_value = value;
                    best_channel = channel;
                }
            }
        }

        candidates.sort_by(|lhs, rhs| rhs.1.total_cmp(&lhs.1));
        candidates.into_iter().map(|(channel, _)| channel).collect()
    }
}

impl Curvature<'_> {
    /// Mean of the baseline-corrected height and the dip depth, both relative
    /// to their spectrum-wide maxima.
    fn score(&self, channel: usize) -> f64 {
        let last = self.data.len() - 1;
        let limit = channel.min(last - channel).min(MAX_SCORE_REACH);

        let mut reach = limit.min(1);
        while reach < limit {
            if self.d2[channel - reach] < self.d2[channel - reach + 1] {
                break;
            }
            if self.d2[channel + reach] < self.d2[channel + reach - 1] {
                break;
            }
            reach += 1;
        }

        let before = self.data[channel - reach];
        let after = self.data[channel + reach];
        let baseline = (before + after) / 2.0;
        let height = self.data[channel] - baseline;

        let height_share = if self.data_max > 0.0 {
            height / self.data_max
        } else {
            0.0
        };
        let depth_share = if self.d2_max > 0.0 {
            -self.d2[channel] / self.d2_max
        } else {
            0.0
        };
        (height_share + depth_share) / 2.0
    }
}
