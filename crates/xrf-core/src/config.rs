//! JSON job files describing one spectrum to fit.

use crate::calibration::CalibrationReference;
use crate::catalog::StaticCatalog;
use crate::domain::{
    EnergyCalibration, EscapePeakType, Signature, SignatureKey, XrfError, XrfResult,
};
use crate::fitting::{CurveFitter, FittingParameters, FittingSet};
use crate::ordering::PermutationScoring;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FitJobError {
    #[error("failed to read fit job '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse fit job '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid fit job '{}': {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

impl From<FitJobError> for XrfError {
    fn from(error: FitJobError) -> Self {
        let message = error.to_string();
        match error {
            FitJobError::Read { .. } => XrfError::io_system("IO.FIT_JOB_READ", message),
            FitJobError::Parse { .. } => XrfError::input_validation("INPUT.FIT_JOB_PARSE", message),
            FitJobError::Invalid { .. } => {
                XrfError::input_validation("INPUT.FIT_JOB_INVALID", message)
            }
        }
    }
}

/// One spectrum plus everything needed to fit and calibrate it.
///
/// `signatures` doubles as the lookup catalog; `selection` picks which of them
/// are fitted, in priority order, and defaults to all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitJob {
    pub calibration: EnergyCalibration,
    #[serde(default)]
    pub escape: EscapePeakType,
    #[serde(default)]
    pub fitter: CurveFitter,
    #[serde(default)]
    pub scoring: PermutationScoring,
    #[serde(default)]
    pub parameters: FittingParameters,
    pub signatures: Vec<Signature>,
    #[serde(default)]
    pub selection: Option<Vec<SignatureKey>>,
    pub spectrum: Vec<f64>,
    #[serde(default)]
    pub reference: Option<CalibrationReference>,
}

impl FitJob {
    pub fn validate(&self) -> Result<(), String> {
        if self.spectrum.len() != self.calibration.channels() {
            return Err(format!(
                "spectrum has {} channels but the calibration declares {}",
                self.spectrum.len(),
                self.calibration.channels()
            ));
        }
        if let Some(channel) = self.spectrum.iter().position(|value| !value.is_finite()) {
            return Err(format!("spectrum channel {channel} is not finite"));
        }
        self.parameters.validate()?;

        if let Some(selection) = &self.selection {
            for key in selection {
                if !self.signatures.iter().any(|signature| signature.key() == *key) {
                    return Err(format!("selected signature {key} has no definition"));
                }
            }
        }
        Ok(())
    }

    pub fn catalog(&self) -> StaticCatalog {
        self.signatures.iter().cloned().collect()
    }

    /// Selected signature definitions, in selection order.
    pub fn selected_signatures(&self) -> Vec<Signature> {
        match &self.selection {
            None => self.signatures.clone(),
            Some(selection) => selection
                .iter()
                .filter_map(|key| {
                    self.signatures
                        .iter()
                        .find(|signature| signature.key() == *key)
                        .cloned()
                })
                .collect(),
        }
    }

    pub fn fitting_set(&self) -> XrfResult<FittingSet> {
        let set = FittingSet::new(self.calibration, self.escape);
        set.set_parameters(self.parameters)?;
        set.add_all(self.selected_signatures());
        Ok(set)
    }
}

pub fn load_fit_job(job_path: impl AsRef<Path>) -> Result<FitJob, FitJobError> {
    let job_path = job_path.as_ref();
    let source = fs::read_to_string(job_path).map_err(|source| FitJobError::Read {
        path: job_path.to_path_buf(),
        source,
    })?;
    let job: FitJob = serde_json::from_str(&source).map_err(|source| FitJobError::Parse {
        path: job_path.to_path_buf(),
        source,
    })?;
    job.validate().map_err(|message| FitJobError::Invalid {
        path: job_path.to_path_buf(),
        message,
    })?;
    Ok(job)
}
