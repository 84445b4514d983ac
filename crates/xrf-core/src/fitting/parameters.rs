use serde::{Deserialize, Serialize};
use std::f64::consts::{LN_2, PI};

const DEFAULT_FWHM_BASE: f64 = 0.080;
const DEFAULT_FWHM_SLOPE: f64 = 0.010;
const DEFAULT_ESCAPE_INTENSITY: f64 = 0.010;

/// Line broadening function. Every shape is height-normalized (value 1 at the
/// line centre) so a line's relative intensity is its peak height in the template.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PeakShape {
    #[default]
    Gaussian,
    Lorentzian,
    /// Linear mix of Lorentzian (`lorentz_fraction`) and Gaussian profiles with a shared FWHM.
    #[serde(rename_all = "camelCase")]
    PseudoVoigt { lorentz_fraction: f64 },
}

impl PeakShape {
    /// Height at `offset` keV from the line centre for the given FWHM.
    pub fn value(self, offset: f64, fwhm: f64) -> f64 {
        if fwhm <= 0.0 {
            return if offset == 0.0 { 1.0 } else { 0.0 };
        }
        match self {
            Self::Gaussian => gaussian(offset, fwhm),
            Self::Lorentzian => lorentzian(offset, fwhm),
            Self::PseudoVoigt { lorentz_fraction } => {
                let eta = lorentz_fraction.clamp(0.0, 1.0);
                eta * lorentzian(offset, fwhm) + (1.0 - eta) * gaussian(offset, fwhm)
            }
        }
    }

    /// Area under a height-normalized peak; used to compare shapes, not in fitting.
    pub fn area(self, fwhm: f64) -> f64 {
        let gaussian_area = fwhm * (PI / (4.0 * LN_2)).sqrt();
        let lorentzian_area = PI * fwhm / 2.0;
        match self {
            Self::Gaussian => gaussian_area,
            Self::Lorentzian => lorentzian_area,
            Self::PseudoVoigt { lorentz_fraction } => {
                let eta = lorentz_fraction.clamp(0.0, 1.0);
                eta * lorentzian_area + (1.0 - eta) * gaussian_area
            }
        }
    }
}

fn gaussian(offset: f64, fwhm: f64) -> f64 {
    let ratio = offset / fwhm;
    (-4.0 * LN_2 * ratio * ratio).exp()
}

fn lorentzian(offset: f64, fwhm: f64) -> f64 {
    let half_width = fwhm / 2.0;
    let ratio = offset / half_width;
    1.0 / (1.0 + ratio * ratio)
}

/// Shared fitting parameters owned by a fitting set.
///
/// Detector resolution is modelled as `fwhm(E) = fwhm_base + fwhm_slope * E`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FittingParameters {
    pub shape: PeakShape,
    pub fwhm_base: f64,
    pub fwhm_slope: f64,
    /// Escape-peak height relative to its parent line.
    pub escape_intensity: f64,
}

impl FittingParameters {
    pub fn fwhm(&self, energy: f64) -> f64 {
        (self.fwhm_base + self.fwhm_slope * energy).max(0.0)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let values = [
            ("fwhmBase", self.fwhm_base),
            ("fwhmSlope", self.fwhm_slope),
            ("escapeIntensity", self.escape_intensity),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be finite and >= 0, got {value}"));
            }
        }
        if let PeakShape::PseudoVoigt { lorentz_fraction } = self.shape {
            if !(0.0..=1.0).contains(&lorentz_fraction) {
                return Err(format!(
                    "lorentzFraction must lie in [0, 1], got {lorentz_fraction}"
                ));
            }
        }
        Ok(())
    }
}

impl Default for FittingParameters {
    fn default() -> Self {
        Self {
            shape: PeakShape::Gaussian,
            fwhm_base: DEFAULT_FWHM_BASE,
            fwhm_slope: DEFAULT_FWHM_SLOPE,
            escape_intensity: DEFAULT_ESCAPE_INTENSITY,
        }
    }
}
