use super::errors::XrfError;
use serde::{Deserialize, Serialize};

/// Linear channel/energy mapping for one detector readout.
///
/// Energies are in keV. Channel `i` starts at `min_energy + i * energy_per_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "EnergyCalibrationFields")]
pub struct EnergyCalibration {
    min_energy: f64,
    max_energy: f64,
    channels: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnergyCalibrationError {
    #[error("energy bounds must be finite, got min={min} max={max}")]
    NonFiniteEnergy { min: f64, max: f64 },
    #[error("maximum energy {max} keV is below minimum energy {min} keV")]
    InvertedRange { min: f64, max: f64 },
}

impl EnergyCalibration {
    pub fn new(
        min_energy: f64,
        max_energy: f64,
        channels: usize,
    ) -> Result<Self, EnergyCalibrationError> {
        if !min_energy.is_finite() || !max_energy.is_finite() {
            return Err(EnergyCalibrationError::NonFiniteEnergy {
                min: min_energy,
                max: max_energy,
            });
        }
        if max_energy < min_energy {
            return Err(EnergyCalibrationError::InvertedRange {
                min: min_energy,
                max: max_energy,
            });
        }

        Ok(Self {
            min_energy,
            max_energy,
            channels,
        })
    }

    /// Uncalibrated instrument: no channels and no energy span.
    pub const fn zero() -> Self {
        Self {
            min_energy: 0.0,
            max_energy: 0.0,
            channels: 0,
        }
    }

    pub const fn min_energy(&self) -> f64 {
        self.min_energy
    }

    pub const fn max_energy(&self) -> f64 {
        self.max_energy
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// True when no energy can be mapped to a channel.
    pub fn is_zero(&self) -> bool {
        self.channels == 0 || self.max_energy <= self.min_energy
    }

    pub fn energy_per_channel(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        (self.max_energy - self.min_energy) / self.channels as f64
    }

    /// Fractional channel coordinate of `energy`; may fall outside `0..channels`.
    pub fn channel_position(&self, energy: f64) -> Option<f64> {
        let per_channel = self.energy_per_channel();
        if per_channel <= 0.0 {
            return None;
        }
        Some((energy - self.min_energy) / per_channel)
    }

    pub fn channel_from_energy(&self, energy: f64) -> Option<usize> {
        let position = self.channel_position(energy)?.round();
        if position < 0.0 || position >= self.channels as f64 {
            return None;
        }
        Some(position as usize)
    }

    pub fn energy_from_channel(&self, channel: usize) -> f64 {
        self.min_energy + channel as f64 * self.energy_per_channel()
    }
}

impl Default for EnergyCalibration {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<EnergyCalibrationError> for XrfError {
    fn from(error: EnergyCalibrationError) -> Self {
        XrfError::input_validation("INPUT.ENERGY_RANGE", error.to_string())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnergyCalibrationFields {
    min_energy: f64,
    max_energy: f64,
    channels: usize,
}

impl TryFrom<EnergyCalibrationFields> for EnergyCalibration {
    type Error = EnergyCalibrationError;

    fn try_from(fields: EnergyCalibrationFields) -> Result<Self, Self::Error> {
        Self::new(fields.min_energy, fields.max_energy, fields.channels)
    }
}
