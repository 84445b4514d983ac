use crate::domain::{EnergyCalibration, Signature, SignatureKey};
use crate::numerics::{max_value, stable_sum};

/// One signature's share of a spectrum after greedy fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    signature: Signature,
    scaled_curve: Vec<f64>,
    scale_factor: f64,
}

impl FitResult {
    pub(crate) fn new(signature: Signature, scaled_curve: Vec<f64>, scale_factor: f64) -> Self {
        Self {
            signature,
            scaled_curve,
            scale_factor,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn scaled_curve(&self) -> &[f64] {
        &self.scaled_curve
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn total_intensity(&self) -> f64 {
        stable_sum(&self.scaled_curve)
    }

    pub fn max_intensity(&self) -> f64 {
        max_value(&self.scaled_curve)
    }

    /// Fitted intensity at the channel of the signature's strongest line.
    pub fn intensity_at_strongest_line(&self, calibration: &EnergyCalibration) -> Option<f64> {
        let line = self.signature.strongest_line()?;
        let channel = calibration.channel_from_energy(line.energy)?;
        self.scaled_curve.get(channel).copied()
    }
}

/// Output of one solve: per-signature fits in solve order plus the leftover signal.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResultSet {
    results: Vec<FitResult>,
    residual: Vec<f64>,
    calibration: EnergyCalibration,
}

impl FitResultSet {
    pub(crate) fn new(
        results: Vec<FitResult>,
        residual: Vec<f64>,
        calibration: EnergyCalibration,
    ) -> Self {
        Self {
            results,
            residual,
            calibration,
        }
    }

    pub fn results(&self) -> &[FitResult] {
        &self.results
    }

    pub fn residual(&self) -> &[f64] {
        &self.residual
    }

    /// Calibration the curves were generated under.
    pub fn calibration(&self) -> &EnergyCalibration {
        &self.calibration
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn result_for(&self, key: SignatureKey) -> Option<&FitResult> {
        self.results
            .iter()
            .find(|result| result.signature.key() == key)
    }

    /// Channel-wise sum of every scaled curve.
    pub fn total_fit(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.residual.len()];
        for result in &self.results {
            for (sum, value) in total.iter_mut().zip(&result.scaled_curve) {
                *sum += value;
            }
        }
        total
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FitResult> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a FitResultSet {
    type Item = &'a FitResult;
    type IntoIter = std::slice::Iter<'a, FitResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
