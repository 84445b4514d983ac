//! Reference-sample calibration: turning raw fit intensities into factors
//! that make intensities comparable across elements.

mod concentrations;
mod processors;
mod profile;
mod reference;

pub use concentrations::Concentrations;
pub use processors::{CalibrationPass, DEFAULT_PASSES};
pub use profile::{
    CalibrationProfile, MIN_CALIBRATION_FACTOR, ProfileError, SerializedCalibrationProfile,
};
pub use reference::{CalibrationReference, InMemoryReferenceLibrary, ReferenceLibrary};
