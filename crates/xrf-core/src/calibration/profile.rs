use super::processors::{CalibrationPass, DEFAULT_PASSES};
use super::reference::{CalibrationReference, ReferenceLibrary};
use crate::domain::{ShellType, SignatureKey, SignatureKeyParseError, XrfError};
use crate::fitting::{FitResult, FitResultSet};
use crate::numerics::stable_sum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw factors below this are treated as solver artifacts and dropped.
pub const MIN_CALIBRATION_FACTOR: f64 = 1.0;

const EMPTY_PROFILE_NAME: &str = "Empty calibration profile";

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read calibration profile '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write calibration profile '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse calibration profile: {source}")]
    Parse { source: serde_json::Error },
    #[error("failed to serialize calibration profile: {source}")]
    Serialize { source: serde_json::Error },
    #[error("cannot find calibration reference '{name}' ({id})")]
    UnknownReference { id: String, name: String },
    #[error("calibration profile entry is invalid: {source}")]
    InvalidIdentifier { source: SignatureKeyParseError },
}

impl From<ProfileError> for XrfError {
    fn from(error: ProfileError) -> Self {
        let message = error.to_string();
        match error {
            ProfileError::Read { .. } => XrfError::io_system("IO.PROFILE_READ", message),
            ProfileError::Write { .. } => XrfError::io_system("IO.PROFILE_WRITE", message),
            ProfileError::Parse { .. } | ProfileError::InvalidIdentifier { .. } => {
                XrfError::input_validation("INPUT.PROFILE_FORMAT", message)
            }
            ProfileError::UnknownReference { .. } => {
                XrfError::input_validation("INPUT.PROFILE_REFERENCE", message)
            }
            ProfileError::Serialize { .. } => XrfError::internal("RUN.PROFILE_SERIALIZE", message),
        }
    }
}

/// Stable persisted form of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedCalibrationProfile {
    pub reference_id: String,
    pub reference_name: String,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub calibrations: BTreeMap<String, f64>,
}

/// Per-signature calibration factors derived from one reference measurement.
///
/// Keys are always canonical. Lookups accept anything convertible into a
/// [`SignatureKey`], so decorated signatures resolve to the same factor as
/// their bare counterparts.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationProfile {
    reference_id: String,
    reference_name: String,
    name: String,
    factors: BTreeMap<SignatureKey, f64>,
    interpolated: BTreeSet<SignatureKey>,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::empty()
    }
}

impl CalibrationProfile {
    pub fn empty() -> Self {
        Self {
            reference_id: String::new(),
            reference_name: String::new(),
            name: EMPTY_PROFILE_NAME.to_string(),
            factors: BTreeMap::new(),
            interpolated: BTreeSet::new(),
        }
    }

    /// Cross-references `fit` against `reference` and applies the default passes.
    pub fn build(reference: &CalibrationReference, fit: &FitResultSet) -> Self {
        Self::build_with(reference, fit, &DEFAULT_PASSES)
    }

    pub fn build_with(
        reference: &CalibrationReference,
        fit: &FitResultSet,
        passes: &[CalibrationPass],
    ) -> Self {
        if fit.calibration().is_zero() {
            debug!(reference = reference.id(), "uncalibrated fit, profile left empty");
            return Self::for_reference(reference);
        }

        let measured = fit.iter().filter_map(|result| {
            let key = result.signature().key();
            let concentration = reference.concentration(key)?;
            let intensity = result.intensity_at_strongest_line(fit.calibration())?;
            Some((key, intensity / concentration * 1000.0))
        });
        Self::from_measured(reference, measured, passes)
    }

    /// Starts from already measured factors, dropping implausible ones, then
    /// runs `passes` in order.
    pub fn from_measured(
        reference: &CalibrationReference,
        measured: impl IntoIterator<Item = (SignatureKey, f64)>,
        passes: &[CalibrationPass],
    ) -> Self {
        let mut profile = Self::for_reference(reference);
        for (key, factor) in measured {
            if !factor.is_finite() || factor < MIN_CALIBRATION_FACTOR {
                debug!(signature = %key, factor, "dropping implausible calibration factor");
                continue;
            }
            profile.factors.insert(key, factor);
        }

        for pass in passes {
            pass.apply(reference, &mut profile.factors, &mut profile.interpolated);
        }
        debug!(
            reference = reference.id(),
            factors = profile.factors.len(),
            interpolated = profile.interpolated.len(),
            "calibration profile built"
        );
        profile
    }

    fn for_reference(reference: &CalibrationReference) -> Self {
        Self {
            reference_id: reference.id().to_string(),
            reference_name: reference.name().to_string(),
            name: reference.name().to_string(),
            ..Self::empty()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    pub fn factors(&self) -> &BTreeMap<SignatureKey, f64> {
        &self.factors
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn contains(&self, signature: impl Into<SignatureKey>) -> bool {
        self.factors.contains_key(&signature.into())
    }

    pub fn factor(&self, signature: impl Into<SignatureKey>) -> Option<f64> {
        self.factors.get(&signature.into()).copied()
    }

    /// True for entries filled in by interpolation rather than measured.
    pub fn is_interpolated(&self, signature: impl Into<SignatureKey>) -> bool {
        self.interpolated.contains(&signature.into())
    }

    /// Calibrated signatures of one shell, ascending by atomic number.
    pub fn signatures_for_shell(&self, shell: ShellType) -> Vec<SignatureKey> {
        let mut keys: Vec<SignatureKey> = self
            .factors
            .keys()
            .filter(|key| key.shell == shell)
            .copied()
            .collect();
        keys.sort_by_key(|key| key.element);
        keys
    }

    /// `value / factor` when a factor exists, otherwise `value` unchanged.
    pub fn calibrate(&self, value: f64, signature: impl Into<SignatureKey>) -> f64 {
        match self.factor(signature) {
            Some(factor) => value / factor,
            None => value,
        }
    }

    /// Calibrated total intensity of one fit result.
    pub fn calibrate_result(&self, result: &FitResult) -> f64 {
        self.calibrate(stable_sum(result.scaled_curve()), result.signature())
    }

    /// Divides every value of a per-pixel intensity map by the signature's factor.
    pub fn calibrate_map(&self, map: &[f64], signature: impl Into<SignatureKey>) -> Vec<f64> {
        match self.factor(signature) {
            Some(factor) => map.iter().map(|value| value / factor).collect(),
            None => map.to_vec(),
        }
    }

    pub fn to_serialized(&self) -> SerializedCalibrationProfile {
        SerializedCalibrationProfile {
            reference_id: self.reference_id.clone(),
            reference_name: self.reference_name.clone(),
            profile_name: Some(self.name.clone()),
            calibrations: self
                .factors
                .iter()
                .map(|(key, factor)| (key.identifier(), *factor))
                .collect(),
        }
    }

    /// Rebuilds a profile from its persisted form. Fails without a partial
    /// result when the reference is unknown or an identifier does not parse.
    pub fn from_serialized(
        serialized: SerializedCalibrationProfile,
        library: &dyn ReferenceLibrary,
    ) -> Result<Self, ProfileError> {
        let reference = library.reference(&serialized.reference_id).ok_or_else(|| {
            ProfileError::UnknownReference {
                id: serialized.reference_id.clone(),
                name: serialized.reference_name.clone(),
            }
        })?;

        let factors = serialized
            .calibrations
            .iter()
            .map(|(identifier, factor)| {
                identifier
                    .parse::<SignatureKey>()
                    .map(|key| (key, *factor))
                    .map_err(|source| ProfileError::InvalidIdentifier { source })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self {
            reference_id: reference.id().to_string(),
            reference_name: reference.name().to_string(),
            name: serialized
                .profile_name
                .unwrap_or_else(|| reference.name().to_string()),
            factors,
            interpolated: BTreeSet::new(),
        })
    }

    pub fn to_json(&self) -> Result<String, ProfileError> {
        serde_json::to_string_pretty(&self.to_serialized())
            .map_err(|source| ProfileError::Serialize { source })
    }

    pub fn from_json(json: &str, library: &dyn ReferenceLibrary) -> Result<Self, ProfileError> {
        let serialized: SerializedCalibrationProfile =
            serde_json::from_str(json).map_err(|source| ProfileError::Parse { source })?;
        Self::from_serialized(serialized, library)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProfileError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|source| ProfileError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(
        path: impl AsRef<Path>,
        library: &dyn ReferenceLibrary,
    ) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, library)
    }
}
