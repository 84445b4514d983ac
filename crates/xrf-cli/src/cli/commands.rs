use super::CliError;
use super::helpers::*;
use std::path::PathBuf;
use tracing::info;
use xrf_core::calibration::CalibrationProfile;
use xrf_core::domain::XrfError;
use xrf_core::ordering::{OrderingOptimizer, reorder_fitting_set};
use xrf_core::search::PeakSearcher;

const MAX_PROPOSALS_PER_PEAK: usize = 3;

#[derive(clap::Args)]
pub(super) struct FitArgs {
    /// Fit job JSON path
    job: PathBuf,

    /// Reorder overlapping signatures before the final fit
    #[arg(long)]
    optimize: bool,

    /// Saved calibration profile applied to the fitted intensities
    #[arg(long)]
    profile: Option<PathBuf>,

    /// JSON report output path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(super) enum SearcherKind {
    Derivative,
    Tophat,
}

impl SearcherKind {
    fn searcher(self) -> PeakSearcher {
        match self {
            Self::Derivative => PeakSearcher::derivative(),
            Self::Tophat => PeakSearcher::top_hat(),
        }
    }
}

#[derive(clap::Args)]
pub(super) struct PeaksArgs {
    /// Fit job JSON path
    job: PathBuf,

    /// Peak detection algorithm
    #[arg(long, value_enum, default_value = "derivative")]
    searcher: SearcherKind,

    /// Report at most this many peaks, best first
    #[arg(long)]
    limit: Option<usize>,

    /// Suggest unselected catalog signatures for each peak
    #[arg(long)]
    propose: bool,

    /// JSON report output path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ProfileArgs {
    /// Fit job JSON path; must carry a reference sample
    job: PathBuf,

    /// Name stored in the saved profile
    #[arg(long)]
    name: Option<String>,

    /// Where to save the profile JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// JSON report output path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(super) fn run_fit_command(args: FitArgs) -> Result<i32, CliError> {
    let job = load_job(&args.job)?;
    let set = job.fitting_set()?;

    if args.optimize {
        let order = reorder_fitting_set(&set, &job.spectrum, job.fitter, job.scoring);
        info!(
            scoring = job.scoring.name(),
            order = ?order.iter().map(|key| key.identifier()).collect::<Vec<_>>(),
            "fitting order optimized"
        );
    }

    let profile = args
        .profile
        .as_deref()
        .map(|path| load_profile(path, &job))
        .transpose()?;

    let fit = set.fit(&job.spectrum, job.fitter);
    let report = FitReport::new(&fit, job.fitter.name(), args.optimize, profile.as_ref());
    emit_report(&report, args.output.as_deref())?;
    Ok(0)
}

pub(super) fn run_peaks_command(args: PeaksArgs) -> Result<i32, CliError> {
    let job = load_job(&args.job)?;
    let searcher = args.searcher.searcher();

    let mut channels = searcher.search(&job.spectrum);
    if let Some(limit) = args.limit {
        channels.truncate(limit);
    }

    let mut peaks: Vec<PeakReport> = channels
        .iter()
        .map(|channel| PeakReport::new(*channel, &job.spectrum, &job.calibration))
        .collect();

    if args.propose {
        let set = job.fitting_set()?;
        let snapshot = set.snapshot();
        let residual = set.fit(&job.spectrum, job.fitter).residual().to_vec();
        let optimizer = OrderingOptimizer::for_snapshot(&snapshot, job.fitter);
        let catalog = job.catalog();

        for peak in &mut peaks {
            peak.candidates = optimizer
                .propose_for_channel(&catalog, &snapshot.signatures, &residual, peak.channel)
                .into_iter()
                .take(MAX_PROPOSALS_PER_PEAK)
                .map(|(signature, score)| CandidateReport {
                    signature: signature.key().identifier(),
                    score,
                })
                .collect();
        }
    }

    let report = PeaksReport {
        searcher: searcher.name(),
        peaks,
    };
    emit_report(&report, args.output.as_deref())?;
    Ok(0)
}

pub(super) fn run_profile_command(args: ProfileArgs) -> Result<i32, CliError> {
    let job = load_job(&args.job)?;
    let reference = job.reference.as_ref().ok_or_else(|| {
        XrfError::input_validation(
            "INPUT.PROFILE_REFERENCE",
            format!(
                "fit job '{}' has no reference sample to calibrate against",
                args.job.display()
            ),
        )
    })?;

    let set = job.fitting_set()?;
    let fit = set.fit(&job.spectrum, job.fitter);
    let mut profile = CalibrationProfile::build(reference, &fit);
    if let Some(name) = args.name {
        profile.set_name(name);
    }

    if let Some(path) = args.save.as_deref() {
        profile.save(path).map_err(XrfError::from)?;
        info!(
            profile = profile.name(),
            path = %path.display(),
            factors = profile.factors().len(),
            "calibration profile saved"
        );
    }

    let report = ProfileReport::new(&profile, args.save.as_deref());
    emit_report(&report, args.output.as_deref())?;
    Ok(0)
}
