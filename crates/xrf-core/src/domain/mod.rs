pub mod errors;

mod calibration;
mod signature;

pub use calibration::{EnergyCalibration, EnergyCalibrationError};
pub use errors::{XrfError, XrfErrorCategory, XrfResult};
pub use signature::{EmissionLine, ShellType, Signature, SignatureKey, SignatureKeyParseError};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Detector escape-artifact model applied during curve generation.
///
/// An escape peak appears when a detector atom fluoresces and the photon leaves
/// the crystal, so the recorded energy is the parent energy minus the detector
/// element's own line energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EscapePeakType {
    #[default]
    None,
    Silicon,
    Germanium,
}

const SILICON_ESCAPE_LINES: [EmissionLine; 1] = [EmissionLine::new(1.740, 1.0)];
const GERMANIUM_ESCAPE_LINES: [EmissionLine; 2] = [
    EmissionLine::new(9.886, 0.867),
    EmissionLine::new(10.982, 0.133),
];

impl EscapePeakType {
    pub const ALL: [EscapePeakType; 3] = [Self::None, Self::Silicon, Self::Germanium];

    /// Detector lines whose energy is subtracted from each parent line.
    pub const fn escape_lines(self) -> &'static [EmissionLine] {
        match self {
            Self::None => &[],
            Self::Silicon => &SILICON_ESCAPE_LINES,
            Self::Germanium => &GERMANIUM_ESCAPE_LINES,
        }
    }

    /// Detector absorption edge in keV; parent lines below it cannot produce escapes.
    pub const fn absorption_edge(self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Silicon => Some(1.839),
            Self::Germanium => Some(11.103),
        }
    }

    pub const fn has_escape(self) -> bool {
        !matches!(self, Self::None)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Silicon => "silicon",
            Self::Germanium => "germanium",
        }
    }
}

impl Display for EscapePeakType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
