use super::reference::CalibrationReference;
use crate::domain::{ShellType, SignatureKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Post-processing step applied to measured calibration factors, one shell at
/// a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationPass {
    /// Fills every gap between two known factors of the same shell by linear
    /// interpolation in atomic number. Never extrapolates.
    LinearInterpolation,
    /// `[1, 2, 1] / 4` smoothing over runs of consecutive atomic numbers; run
    /// endpoints are left as they are.
    NeighbourSmoothing,
    /// Divides every factor by the reference anchor's factor.
    AnchorNormalization,
}

/// Passes applied by [`super::CalibrationProfile::build`], in order.
pub const DEFAULT_PASSES: [CalibrationPass; 3] = [
    CalibrationPass::LinearInterpolation,
    CalibrationPass::NeighbourSmoothing,
    CalibrationPass::AnchorNormalization,
];

impl CalibrationPass {
    pub const fn name(self) -> &'static str {
        match self {
            Self::LinearInterpolation => "linear-interpolation",
            Self::NeighbourSmoothing => "neighbour-smoothing",
            Self::AnchorNormalization => "anchor-normalization",
        }
    }

    pub(crate) fn apply(
        self,
        reference: &CalibrationReference,
        factors: &mut BTreeMap<SignatureKey, f64>,
        interpolated: &mut BTreeSet<SignatureKey>,
    ) {
        match self {
            Self::LinearInterpolation => {
                for shell in ShellType::ALL {
                    interpolate_shell(shell, factors, interpolated);
                }
            }
            Self::NeighbourSmoothing => {
                for shell in ShellType::ALL {
                    smooth_shell(shell, factors);
                }
            }
            Self::AnchorNormalization => normalize(reference, factors),
        }
    }
}

/// Factors of one shell, ascending by atomic number.
fn shell_entries(shell: ShellType, factors: &BTreeMap<SignatureKey, f64>) -> Vec<(SignatureKey, f64)> {
    let mut entries: Vec<(SignatureKey, f64)> = factors
        .iter()
        .filter(|(key, _)| key.shell == shell)
        .map(|(key, value)| (*key, *value))
        .collect();
    entries.sort_by_key(|(key, _)| key.element);
    entries
}

fn interpolate_shell(
    shell: ShellType,
    factors: &mut BTreeMap<SignatureKey, f64>,
    interpolated: &mut BTreeSet<SignatureKey>,
) {
    let knowns = shell_entries(shell, factors);
    for pair in knowns.windows(2) {
        let (low, low_value) = pair[0];
        let (high, high_value) = pair[1];
        let low_z = f64::from(low.element.atomic_number());
        let span = f64::from(high.element.atomic_number()) - low_z;

        for element in low.element.between(high.element) {
            let fraction = (f64::from(element.atomic_number()) - low_z) / span;
            let key = SignatureKey::new(element, shell);
            factors.insert(key, low_value + (high_value - low_value) * fraction);
            interpolated.insert(key);
        }
    }
}

fn smooth_shell(shell: ShellType, factors: &mut BTreeMap<SignatureKey, f64>) {
    let entries = shell_entries(shell, factors);
    let mut start = 0;
    while start < entries.len() {
        let mut end = start;
        while end + 1 < entries.len()
            && entries[end + 1].0.element.atomic_number()
                == entries[end].0.element.atomic_number() + 1
        {
            end += 1;
        }

        for index in start + 1..end {
            let smoothed =
                (entries[index - 1].1 + 2.0 * entries[index].1 + entries[index + 1].1) / 4.0;
            factors.insert(entries[index].0, smoothed);
        }
        start = end + 1;
    }
}

fn normalize(reference: &CalibrationReference, factors: &mut BTreeMap<SignatureKey, f64>) {
    let anchor = reference.anchor();
    match factors.get(&anchor).copied() {
        Some(value) if value.is_finite() && value > 0.0 => {
            for factor in factors.values_mut() {
                *factor /= value;
            }
        }
        _ => debug!(
            anchor = %anchor,
            reference = reference.id(),
            "anchor factor unavailable, profile left unnormalized"
        ),
    }
}
