use super::CliError;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use xrf_core::calibration::{CalibrationProfile, Concentrations, InMemoryReferenceLibrary};
use xrf_core::config::{FitJob, load_fit_job};
use xrf_core::domain::{EnergyCalibration, XrfError};
use xrf_core::fitting::{FitResult, FitResultSet};
use xrf_core::numerics::stable_sum;

/// Installs the stderr subscriber. `RUST_LOG` wins over `--verbose`.
pub(super) fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(super) fn load_job(path: &Path) -> Result<FitJob, CliError> {
    let job = load_fit_job(path).map_err(XrfError::from)?;
    tracing::debug!(
        job = %path.display(),
        channels = job.spectrum.len(),
        signatures = job.signatures.len(),
        "fit job loaded"
    );
    Ok(job)
}

pub(super) fn load_profile(path: &Path, job: &FitJob) -> Result<CalibrationProfile, CliError> {
    let library = InMemoryReferenceLibrary::new(job.reference.clone());
    CalibrationProfile::load(path, &library).map_err(|error| CliError::Compute(error.into()))
}

/// Pretty JSON to `output` when given, otherwise to stdout.
pub(super) fn emit_report<T: Serialize>(report: &T, output: Option<&Path>) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(report).context("failed to render JSON report")?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create report directory '{}'", parent.display())
                })?;
            }
            fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write report '{}'", path.display()))?;
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FitReport {
    pub(super) fitter: &'static str,
    pub(super) optimized: bool,
    pub(super) profile: Option<String>,
    pub(super) order: Vec<String>,
    pub(super) results: Vec<FitResultReport>,
    pub(super) residual_total: f64,
    pub(super) concentrations: BTreeMap<String, ConcentrationReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FitResultReport {
    pub(super) signature: String,
    pub(super) scale: f64,
    pub(super) total_intensity: f64,
    pub(super) max_intensity: f64,
    pub(super) calibrated_intensity: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct ConcentrationReport {
    pub(super) ppm: f64,
    pub(super) percent: String,
}

impl FitReport {
    pub(super) fn new(
        fit: &FitResultSet,
        fitter: &'static str,
        optimized: bool,
        profile: Option<&CalibrationProfile>,
    ) -> Self {
        let calibrated = |result: &FitResult| match profile {
            Some(profile) => profile.calibrate_result(result),
            None => result.total_intensity(),
        };

        let keys: Vec<_> = fit.iter().map(|result| result.signature().key()).collect();
        let concentrations = Concentrations::calculate(&keys, |key| {
            fit.result_for(key).map(calibrated).unwrap_or(0.0)
        });

        Self {
            fitter,
            optimized,
            profile: profile.map(|profile| profile.name().to_string()),
            order: keys.iter().map(|key| key.identifier()).collect(),
            results: fit
                .iter()
                .map(|result| FitResultReport {
                    signature: result.signature().key().identifier(),
                    scale: result.scale_factor(),
                    total_intensity: result.total_intensity(),
                    max_intensity: result.max_intensity(),
                    calibrated_intensity: calibrated(result),
                })
                .collect(),
            residual_total: stable_sum(fit.residual()),
            concentrations: concentrations
                .elements_by_z()
                .into_iter()
                .map(|element| {
                    (
                        element.symbol().to_string(),
                        ConcentrationReport {
                            ppm: concentrations.get(element),
                            percent: concentrations.percent(element),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PeakReport {
    pub(super) channel: usize,
    pub(super) energy: f64,
    pub(super) counts: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(super) candidates: Vec<CandidateReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CandidateReport {
    pub(super) signature: String,
    pub(super) score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PeaksReport {
    pub(super) searcher: &'static str,
    pub(super) peaks: Vec<PeakReport>,
}

impl PeakReport {
    pub(super) fn new(channel: usize, spectrum: &[f64], calibration: &EnergyCalibration) -> Self {
        Self {
            channel,
            energy: calibration.energy_from_channel(channel),
            counts: spectrum.get(channel).copied().unwrap_or(0.0),
            candidates: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProfileReport {
    pub(super) reference_id: String,
    pub(super) reference_name: String,
    pub(super) name: String,
    pub(super) factors: BTreeMap<String, f64>,
    pub(super) interpolated: Vec<String>,
    pub(super) saved_to: Option<String>,
}

impl ProfileReport {
    pub(super) fn new(profile: &CalibrationProfile, saved_to: Option<&Path>) -> Self {
        Self {
            reference_id: profile.reference_id().to_string(),
            reference_name: profile.reference_name().to_string(),
            name: profile.name().to_string(),
            factors: profile
                .factors()
                .iter()
                .map(|(key, factor)| (key.identifier(), *factor))
                .collect(),
            interpolated: profile
                .factors()
                .keys()
                .filter(|key| profile.is_interpolated(**key))
                .map(|key| key.identifier())
                .collect(),
            saved_to: saved_to.map(|path| path.display().to_string()),
        }
    }
}
