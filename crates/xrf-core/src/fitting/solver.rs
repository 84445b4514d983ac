use super::fitter::CurveFitter;
use super::results::{FitResult, FitResultSet};
use crate::curve::Curve;
use crate::domain::EnergyCalibration;
use tracing::debug;

/// Order-dependent sequential fitter.
///
/// Curves are processed strictly in the order given. Each one claims as much of
/// the *current* residual as its [`CurveFitter`] allows, and its scaled template
/// is subtracted before the next curve is considered, so earlier curves have
/// first claim on overlapping signal. The returned residual is always
/// `spectrum - Σ scaled_curve`, evaluated by the same sequence of subtractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GreedyFittingSolver {
    fitter: CurveFitter,
}

impl GreedyFittingSolver {
    pub fn new(fitter: CurveFitter) -> Self {
        Self { fitter }
    }

    pub fn fitter(&self) -> CurveFitter {
        self.fitter
    }

    pub fn solve(
        &self,
        spectrum: &[f64],
        curves: &[Curve],
        calibration: &EnergyCalibration,
    ) -> FitResultSet {
        let mut residual = spectrum.to_vec();
        let mut results = Vec::with_capacity(curves.len());

        for curve in curves {
            let result = self.fit_one(&residual, curve);
            for (remaining, fitted) in residual.iter_mut().zip(result.scaled_curve()) {
                *remaining -= fitted;
            }
            results.push(result);
        }

        debug!(
            fitter = self.fitter.name(),
            curves = curves.len(),
            channels = spectrum.len(),
            "greedy solve finished"
        );
        FitResultSet::new(results, residual, *calibration)
    }

    /// Fit a single curve against `data` without modifying it. The scaled curve
    /// always has `data.len()` channels.
    pub fn fit_one(&self, data: &[f64], curve: &Curve) -> FitResult {
        let template = curve.intensities();
        let scale = self.fitter.scale(data, template);
        let mut scaled_curve = vec![0.0; data.len()];
        for (scaled, value) in scaled_curve.iter_mut().zip(template) {
            *scaled = value * scale;
        }
        FitResult::new(curve.signature().clone(), scaled_curve, scale)
    }
}
