use crate::numerics::{NoiseFilter, first_derivative, max_value};

pub const TOP_HAT_HALF_WIDTH: usize = 5;
pub const TOP_HAT_WING_WIDTH: usize = 10;
pub const TOP_HAT_SMOOTHING_REACH: usize = 10;
pub const TOP_HAT_SMOOTHING_PASSES: usize = 3;
/// Raw intensity, relative to the spectrum maximum, a crossing must exceed.
pub const MIN_RELATIVE_INTENSITY: f64 = 0.002;

/// Finds peaks as maxima of a zero-net top-hat transform of the smoothed spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopHatPeakSearcher {
    /// Half-width of the positive centre lobe.
    pub half_width: usize,
    /// Width of each negative wing.
    pub wing_width: usize,
    pub smoothing: NoiseFilter,
    pub smoothing_passes: usize,
}

impl Default for TopHatPeakSearcher {
    fn default() -> Self {
        Self {
            half_width: TOP_HAT_HALF_WIDTH,
            wing_width: TOP_HAT_WING_WIDTH,
            smoothing: NoiseFilter::WeightedAverage {
                reach: TOP_HAT_SMOOTHING_REACH,
            },
            smoothing_passes: TOP_HAT_SMOOTHING_PASSES,
        }
    }
}

impl TopHatPeakSearcher {
    /// Kernel coefficients indexed by `|offset|`. The centre lobe spans
    /// `2 * half_width + 1` samples and each wing `wing_width`, so the
    /// weights sum to zero over the full kernel.
    pub fn kernel(&self) -> Vec<f64> {
        let centre = 1.0 / (2 * self.half_width + 1) as f64;
        let wing = if self.wing_width == 0 {
            0.0
        } else {
            -1.0 / (2 * self.wing_width) as f64
        };

        let mut coefficients = vec![centre; self.half_width + 1];
        coefficients.resize(self.half_width + 1 + self.wing_width, wing);
        coefficients
    }

    /// Top-hat response of the smoothed spectrum; out-of-range samples are
    /// clamped to the nearest edge.
    pub fn transform(&self, spectrum: &[f64]) -> Vec<f64> {
        let smoothed = self
            .smoothing
            .apply_repeated(spectrum, self.smoothing_passes);
        let kernel = self.kernel();
        let reach = kernel.len() as isize - 1;
        let last = smoothed.len() as isize - 1;

        (0..smoothed.len())
            .map(|index| {
                (-reach..=reach)
                    .map(|offset| {
                        let position = (index as isize + offset).clamp(0, last) as usize;
                        smoothed[position] * kernel[offset.unsigned_abs()]
                    })
                    .sum()
            })
            .collect()
    }

    pub fn search(&self, spectrum: &[f64]) -> Vec<usize> {
        if spectrum.is_empty() {
            return Vec::new();
        }

        let tophat = self.transform(spectrum);
        let slope = first_derivative(&tophat);
        let floor = max_value(spectrum) * MIN_RELATIVE_INTENSITY;

        let mut peaks = Vec::new();
        let mut last_rising = slope[0] > 0.0;
        for channel in 1..spectrum.len() {
            let rising = slope[channel] > 0.0 && tophat[channel] > 0.0;
            if last_rising && !rising && spectrum[channel] > floor {
                let peak = climb(spectrum, channel);
                if !peaks.contains(&peak) {
                    peaks.push(peak);
                }
            }
            last_rising = rising;
        }

        peaks.sort_by(|lhs, rhs| tophat[*rhs].total_cmp(&tophat[*lhs]));
        peaks
    }
}

/// Walks uphill on the raw data to the nearest local maximum.
fn climb(data: &[f64], start: usize) -> usize {
    let mut peak = start;
    loop {
        if peak + 1 < data.len() && data[peak + 1] > data[peak] {
            peak += 1;
        } else if peak > 0 && data[peak - 1] > data[peak] {
            peak -= 1;
        } else {
            return peak;
        }
    }
}
