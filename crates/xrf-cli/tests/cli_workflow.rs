use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CHANNELS: usize = 1024;
const KEV_PER_CHANNEL: f64 = 0.01;

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, contents).expect("file should be written");
}

fn gaussian(energy: f64, center: f64, height: f64) -> f64 {
    let fwhm = 0.080 + 0.010 * center;
    let offset = energy - center;
    height * (-4.0 * std::f64::consts::LN_2 * offset * offset / (fwhm * fwhm)).exp()
}

fn synthetic_spectrum() -> Vec<f64> {
    (0..CHANNELS)
        .map(|channel| {
            let energy = channel as f64 * KEV_PER_CHANNEL;
            gaussian(energy, 3.69, 200.0)
                + gaussian(energy, 6.40, 500.0)
                + gaussian(energy, 7.06, 60.0)
                + gaussian(energy, 8.05, 300.0)
                + gaussian(energy, 8.90, 40.0)
        })
        .collect()
}

fn job_value(spectrum: Vec<f64>, with_reference: bool) -> Value {
    let mut job = json!({
        "calibration": {
            "minEnergy": 0.0,
            "maxEnergy": CHANNELS as f64 * KEV_PER_CHANNEL,
            "channels": CHANNELS
        },
        "signatures": [
            {"element": "Ca", "shell": "K", "lines": [{"energy": 3.69, "relativeIntensity": 1.0}]},
            {"element": "Fe", "shell": "K", "lines": [
                {"energy": 6.40, "relativeIntensity": 1.0},
                {"energy": 7.06, "relativeIntensity": 0.12}
            ]},
            {"element": "Cu", "shell": "K", "lines": [
                {"energy": 8.05, "relativeIntensity": 1.0},
                {"energy": 8.90, "relativeIntensity": 0.13}
            ]},
            {"element": "Zn", "shell": "K", "lines": [{"energy": 8.64, "relativeIntensity": 1.0}]}
        ],
        "selection": ["Ca:K", "Fe:K", "Cu:K"],
        "spectrum": spectrum
    });
    if with_reference {
        job["reference"] = json!({
            "id": "std-1",
            "name": "Alloy standard",
            "anchor": "Fe:K",
            "concentrations": {"Ca:K": 100.0, "Fe:K": 200.0, "Cu:K": 50.0}
        });
    }
    job
}

fn write_job(root: &Path, name: &str, job: &Value) -> std::path::PathBuf {
    let path = root.join(name);
    write_file(
        &path,
        &serde_json::to_string_pretty(job).expect("job should serialize"),
    );
    path
}

fn run_xrfit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xrfit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("xrfit should run")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn fit_command_reports_intensities_in_selection_order() {
    let temp = TempDir::new().expect("tempdir should be created");
    let job = write_job(temp.path(), "job.json", &job_value(synthetic_spectrum(), false));
    let job_arg = job.to_string_lossy().into_owned();

    let report = stdout_json(&run_xrfit(&["fit", &job_arg]));

    assert_eq!(report["fitter"], "least-squares");
    assert_eq!(report["optimized"], false);
    assert_eq!(report["order"], json!(["Ca:K", "Fe:K", "Cu:K"]));
    let results = report["results"].as_array().expect("results array");
    assert_eq!(results.len(), 3);
    for result in results {
        assert!(
            result["totalIntensity"].as_f64().expect("intensity") > 0.0,
            "every selected element is present: {result}"
        );
        assert_eq!(result["totalIntensity"], result["calibratedIntensity"]);
    }

    let ppm_total: f64 = ["Ca", "Fe", "Cu"]
        .iter()
        .map(|symbol| report["concentrations"][symbol]["ppm"].as_f64().expect("ppm"))
        .sum();
    assert!((ppm_total - 1.0e6).abs() < 1.0e-3, "ppm total {ppm_total}");
    assert!(report["concentrations"].get("Zn").is_none());
}

#[test]
fn fit_command_with_optimize_keeps_the_selected_signatures() {
    let temp = TempDir::new().expect("tempdir should be created");
    let job = write_job(temp.path(), "job.json", &job_value(synthetic_spectrum(), false));
    let job_arg = job.to_string_lossy().into_owned();
    let report_path = temp.path().join("reports/fit.json");
    let report_arg = report_path.to_string_lossy().into_owned();

    let output = run_xrfit(&["fit", &job_arg, "--optimize", "--output", &report_arg]);
    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(report_path.exists(), "report file should be created");

    let report: Value = serde_json::from_str(
        &fs::read_to_string(&report_path).expect("report should be readable"),
    )
    .expect("report should be JSON");
    assert_eq!(report["optimized"], true);
    let mut order: Vec<String> = report["order"]
        .as_array()
        .expect("order array")
        .iter()
        .map(|key| key.as_str().expect("identifier").to_string())
        .collect();
    order.sort();
    assert_eq!(order, ["Ca:K", "Cu:K", "Fe:K"]);
}

#[test]
fn peaks_command_finds_the_major_lines() {
    let temp = TempDir::new().expect("tempdir should be created");
    let job = write_job(temp.path(), "job.json", &job_value(synthetic_spectrum(), false));
    let job_arg = job.to_string_lossy().into_owned();

    for searcher in ["derivative", "tophat"] {
        let report = stdout_json(&run_xrfit(&["peaks", &job_arg, "--searcher", searcher]));
        assert_eq!(report["searcher"], searcher);

        let channels: Vec<i64> = report["peaks"]
            .as_array()
            .expect("peaks array")
            .iter()
            .map(|peak| peak["channel"].as_i64().expect("channel"))
            .collect();
        for expected in [369_i64, 640, 805] {
            assert!(
                channels.iter().any(|channel| (channel - expected).abs() <= 5),
                "{searcher} should find a peak near channel {expected}: {channels:?}"
            );
        }
    }

    let limited = stdout_json(&run_xrfit(&[
        "peaks", &job_arg, "--searcher", "tophat", "--limit", "1",
    ]));
    assert_eq!(limited["peaks"].as_array().expect("peaks array").len(), 1);
}

#[test]
fn peaks_command_proposes_unselected_signatures() {
    let temp = TempDir::new().expect("tempdir should be created");
    let spectrum: Vec<f64> = synthetic_spectrum()
        .iter()
        .enumerate()
        .map(|(channel, value)| value + gaussian(channel as f64 * KEV_PER_CHANNEL, 8.64, 250.0))
        .collect();
    let job = write_job(temp.path(), "job.json", &job_value(spectrum, false));
    let job_arg = job.to_string_lossy().into_owned();

    let report = stdout_json(&run_xrfit(&["peaks", &job_arg, "--propose"]));
    let zinc_peak = report["peaks"]
        .as_array()
        .expect("peaks array")
        .iter()
        .find(|peak| (peak["channel"].as_i64().expect("channel") - 864).abs() <= 5)
        .expect("zinc peak should be detected");
    assert_eq!(zinc_peak["candidates"][0]["signature"], "Zn:K");
}

#[test]
fn profile_command_saves_a_profile_that_fit_can_apply() {
    let temp = TempDir::new().expect("tempdir should be created");
    let job = write_job(temp.path(), "job.json", &job_value(synthetic_spectrum(), true));
    let job_arg = job.to_string_lossy().into_owned();
    let profile_path = temp.path().join("profiles/standard.json");
    let profile_arg = profile_path.to_string_lossy().into_owned();
    fs::create_dir_all(temp.path().join("profiles")).expect("profile directory should be created");

    let report = stdout_json(&run_xrfit(&[
        "profile", &job_arg, "--name", "bench", "--save", &profile_arg,
    ]));
    assert_eq!(report["referenceId"], "std-1");
    assert_eq!(report["name"], "bench");
    let fe = report["factors"]["Fe:K"].as_f64().expect("anchor factor");
    assert!((fe - 1.0).abs() < 1.0e-9, "anchor normalizes to one: {fe}");
    assert!(report["factors"]["Mn:K"].is_number());
    assert!(report["factors"].get("Zn:K").is_none());
    let interpolated = report["interpolated"].as_array().expect("interpolated array");
    assert!(interpolated.contains(&json!("Mn:K")));
    assert!(!interpolated.contains(&json!("Fe:K")));
    assert!(profile_path.exists(), "profile file should be created");

    let saved: Value = serde_json::from_str(
        &fs::read_to_string(&profile_path).expect("profile should be readable"),
    )
    .expect("profile should be JSON");
    assert_eq!(saved["referenceId"], "std-1");
    assert_eq!(saved["profileName"], "bench");

    let fit = stdout_json(&run_xrfit(&["fit", &job_arg, "--profile", &profile_arg]));
    assert_eq!(fit["profile"], "bench");
    let fe_result = fit["results"]
        .as_array()
        .expect("results array")
        .iter()
        .find(|result| result["signature"] == "Fe:K")
        .expect("iron result");
    let total = fe_result["totalIntensity"].as_f64().expect("total");
    let calibrated = fe_result["calibratedIntensity"].as_f64().expect("calibrated");
    assert!((total - calibrated).abs() < 1.0e-6 * total.max(1.0));
}

#[test]
fn profile_command_requires_a_reference_sample() {
    let temp = TempDir::new().expect("tempdir should be created");
    let job = write_job(temp.path(), "job.json", &job_value(synthetic_spectrum(), false));
    let job_arg = job.to_string_lossy().into_owned();

    let output = run_xrfit(&["profile", &job_arg]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.PROFILE_REFERENCE]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 2"), "stderr: {stderr}");
}

#[test]
fn invalid_and_missing_jobs_map_to_exit_codes() {
    let temp = TempDir::new().expect("tempdir should be created");
    let short = write_job(temp.path(), "short.json", &job_value(vec![0.0; 10], false));
    let short_arg = short.to_string_lossy().into_owned();

    let invalid = run_xrfit(&["fit", &short_arg]);
    assert_eq!(invalid.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&invalid.stderr).contains("INPUT.FIT_JOB_INVALID"));

    let missing_path = temp.path().join("absent.json");
    let missing = run_xrfit(&["fit", &missing_path.to_string_lossy()]);
    assert_eq!(missing.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&missing.stderr).contains("IO.FIT_JOB_READ"));

    let usage = run_xrfit(&["fit"]);
    assert_eq!(usage.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&usage.stderr).contains("INPUT.CLI_USAGE"));
}

#[test]
fn help_exits_cleanly() {
    let output = run_xrfit(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["fit", "peaks", "profile"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}
