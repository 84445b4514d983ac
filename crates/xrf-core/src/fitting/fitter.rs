use crate::numerics::stable_weighted_sum;
use serde::{Deserialize, Serialize};

/// Template channels below this fraction of the template maximum are ignored by
/// [`CurveFitter::UnderCurve`].
pub const UNDER_CURVE_SIGNIFICANCE: f64 = 0.1;

/// Strategy that picks how much of a template to claim from the current residual.
///
/// Every strategy returns a finite, non-negative scale; the solver owns the
/// subtraction, so the additive decomposition holds for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CurveFitter {
    /// Minimizes `Σ (data - s * curve)^2`, clamped at zero.
    #[default]
    LeastSquares,
    /// Largest scale that keeps the scaled template at or below the data across
    /// the template's significant channels (peak-height ratio).
    UnderCurve,
}

impl CurveFitter {
    pub const ALL: [CurveFitter; 2] = [Self::LeastSquares, Self::UnderCurve];

    pub const fn name(self) -> &'static str {
        match self {
            Self::LeastSquares => "least-squares",
            Self::UnderCurve => "under-curve",
        }
    }

    /// Scale for `template` against `data`; the two slices are compared over
    /// their common prefix.
    pub fn scale(self, data: &[f64], template: &[f64]) -> f64 {
        let len = data.len().min(template.len());
        let (data, template) = (&data[..len], &template[..len]);
        let scale = match self {
            Self::LeastSquares => least_squares_scale(data, template),
            Self::UnderCurve => under_curve_scale(data, template),
        };
        if scale.is_finite() { scale.max(0.0) } else { 0.0 }
    }
}

fn least_squares_scale(data: &[f64], template: &[f64]) -> f64 {
    let numerator = stable_weighted_sum(data, template).unwrap_or(0.0);
    let denominator = stable_weighted_sum(template, template).unwrap_or(0.0);
    if denominator <= 0.0 {
        return 0.0;
    }
    numerator / denominator
}

fn under_curve_scale(data: &[f64], template: &[f64]) -> f64 {
    let peak = crate::numerics::max_value(template);
    if peak <= 0.0 {
        return 0.0;
    }
    let threshold = peak * UNDER_CURVE_SIGNIFICANCE;

    data.iter()
        .zip(template)
        .filter(|(_, curve)| **curve >= threshold)
        .map(|(data, curve)| data.max(0.0) / curve)
        .fold(f64::INFINITY, f64::min)
}
