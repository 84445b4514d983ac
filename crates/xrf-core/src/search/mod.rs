//! Unsupervised peak detection over raw spectra.
//!
//! Both searchers are pure: every call smooths its own copy of the input and
//! returns candidate channels best-first.

mod derivative;
mod tophat;

pub use derivative::{
    CURVATURE_THRESHOLD, DERIVATIVE_SMOOTHING_PASSES, DERIVATIVE_SMOOTHING_REACH,
    DerivativePeakSearcher, MAX_SCORE_REACH, MIN_DIP_RUN, MIN_GAP_RUN, MIN_PEAK_SCORE,
};
pub use tophat::{
    MIN_RELATIVE_INTENSITY, TOP_HAT_HALF_WIDTH, TOP_HAT_SMOOTHING_PASSES,
    TOP_HAT_SMOOTHING_REACH, TOP_HAT_WING_WIDTH, TopHatPeakSearcher,
};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakSearcher {
    Derivative(DerivativePeakSearcher),
    TopHat(TopHatPeakSearcher),
}

impl PeakSearcher {
    pub fn derivative() -> Self {
        Self::Derivative(DerivativePeakSearcher::default())
    }

    pub fn top_hat() -> Self {
        Self::TopHat(TopHatPeakSearcher::default())
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Derivative(_) => "derivative",
            Self::TopHat(_) => "tophat",
        }
    }

    pub fn search(&self, spectrum: &[f64]) -> Vec<usize> {
        let peaks = match self {
            Self::Derivative(searcher) => searcher.search(spectrum),
            Self::TopHat(searcher) => searcher.search(spectrum),
        };
        debug!(
            searcher = self.name(),
            channels = spectrum.len(),
            peaks = peaks.len(),
            "peak search finished"
        );
        peaks
    }
}

impl Default for PeakSearcher {
    fn default() -> Self {
        Self::derivative()
    }
}
