use xrf_core::calibration::{
    CalibrationPass, CalibrationProfile, CalibrationReference, Concentrations,
    InMemoryReferenceLibrary,
};
use xrf_core::common::elements::Element;
use xrf_core::curve::CurveGenerator;
use xrf_core::domain::{
    EmissionLine, EnergyCalibration, EscapePeakType, ShellType, Signature, SignatureKey,
};
use xrf_core::fitting::{CurveFitter, FittingSet};

fn calibration() -> EnergyCalibration {
    EnergyCalibration::new(0.0, 10.24, 1024).expect("calibration should be valid")
}

fn element(z: u8) -> Element {
    Element::from_atomic_number(z).expect("element should exist")
}

fn k_key(z: u8) -> SignatureKey {
    SignatureKey::new(element(z), ShellType::K)
}

fn k_signature(z: u8, energy: f64) -> Signature {
    Signature::new(element(z), ShellType::K, vec![EmissionLine::new(energy, 1.0)])
}

fn standard() -> CalibrationReference {
    CalibrationReference::new(
        "std-ca-cr-zn",
        "Ca/Cr/Zn standard",
        k_key(24),
        [(k_key(20), 150.0), (k_key(24), 400.0), (k_key(30), 250.0)],
    )
}

fn fitted_standard() -> xrf_core::fitting::FitResultSet {
    let signatures = [k_signature(20, 3.69), k_signature(24, 5.41), k_signature(30, 8.64)];
    let generator = CurveGenerator::default();
    let mut spectrum = vec![0.0; calibration().channels()];
    for (signature, scale) in signatures.iter().zip([300.0, 500.0, 900.0]) {
        let curve = generator.generate(signature, &calibration(), EscapePeakType::None);
        for (channel, value) in spectrum.iter_mut().zip(curve.intensities()) {
            *channel += scale * value;
        }
    }

    let set = FittingSet::new(calibration(), EscapePeakType::None);
    set.add_all(signatures);
    set.fit(&spectrum, CurveFitter::LeastSquares)
}

#[test]
fn bounded_interpolation_covers_only_the_gaps() {
    let profile = CalibrationProfile::build(&standard(), &fitted_standard());

    let k_numbers: Vec<u8> = profile
        .signatures_for_shell(ShellType::K)
        .iter()
        .map(|key| key.element.atomic_number())
        .collect();
    assert_eq!(k_numbers, (20..=30).collect::<Vec<u8>>());

    for z in (21..=23).chain(25..=29) {
        assert!(profile.is_interpolated(k_key(z)), "Z={z} should be interpolated");
    }
    for z in [20, 24, 30] {
        assert!(!profile.is_interpolated(k_key(z)), "Z={z} was measured");
    }
    assert!(!profile.contains(k_key(19)));
    assert!(!profile.contains(k_key(31)));
    assert!(profile.signatures_for_shell(ShellType::L).is_empty());
    assert!((profile.factor(k_key(24)).expect("anchor factor") - 1.0).abs() < 1.0e-12);
}

#[test]
fn interpolated_factors_stay_between_and_track_their_neighbours() {
    let measured = [(k_key(20), 10.0), (k_key(24), 50.0), (k_key(30), 20.0)];
    let profile = CalibrationProfile::from_measured(
        &standard(),
        measured,
        &[CalibrationPass::LinearInterpolation],
    );

    let factor = |z: u8| profile.factor(k_key(z)).expect("factor should exist");
    for z in 21..24 {
        assert!(factor(z) >= 10.0 && factor(z) <= 50.0);
        assert!(factor(z) > factor(z - 1));
    }
    for z in 25..30 {
        assert!(factor(z) >= 20.0 && factor(z) <= 50.0);
        assert!(factor(z) < factor(z - 1));
    }
}

#[test]
fn calibration_ignores_signature_decoration() {
    let profile = CalibrationProfile::build(&standard(), &fitted_standard());
    let plain = k_signature(26, 6.40);
    let decorated = Signature::new(
        element(26),
        ShellType::K,
        vec![EmissionLine::new(6.40, 1.0), EmissionLine::new(7.06, 0.12)],
    )
    .with_visibility(false);

    assert!(profile.contains(&plain));
    assert_eq!(profile.calibrate(1234.5, &plain), profile.calibrate(1234.5, &decorated));
    assert_eq!(
        profile.calibrate_map(&[1.0, 2.0], &plain),
        profile.calibrate_map(&[1.0, 2.0], &decorated)
    );
    assert_eq!(profile.calibrate(7.0, k_key(40)), 7.0);
}

#[test]
fn uncalibrated_fits_produce_empty_profiles() {
    let set = FittingSet::default();
    set.add_all([k_signature(20, 3.69), k_signature(24, 5.41)]);
    let fit = set.fit(&[], CurveFitter::LeastSquares);
    assert!(fit.calibration().is_zero());

    let profile = CalibrationProfile::build(&standard(), &fit);
    assert!(profile.is_empty());
    assert!(profile.factors().is_empty());
    assert_eq!(profile.reference_id(), "std-ca-cr-zn");
    assert_eq!(profile.calibrate(42.0, k_key(20)), 42.0);
}

#[test]
fn saved_profiles_calibrate_concentrations_after_reload() {
    let fit = fitted_standard();
    let mut profile = CalibrationProfile::build(&standard(), &fit);
    profile.set_name("bench");

    let temp = tempfile::TempDir::new().expect("tempdir should be created");
    let path = temp.path().join("profile.json");
    profile.save(&path).expect("profile should save");

    let library = InMemoryReferenceLibrary::new([standard()]);
    let reloaded = CalibrationProfile::load(&path, &library).expect("profile should load");
    assert_eq!(reloaded.name(), "bench");
    assert_eq!(reloaded.factors().len(), profile.factors().len());
    for (key, factor) in profile.factors() {
        let restored = reloaded.factor(*key).expect("factor should survive reload");
        assert!((restored - factor).abs() <= 1.0e-12 * factor.abs().max(1.0));
    }

    let keys: Vec<SignatureKey> = fit.iter().map(|result| result.signature().key()).collect();
    let concentrations = Concentrations::calculate(&keys, |key| {
        fit.result_for(key)
            .map(|result| reloaded.calibrate_result(result))
            .unwrap_or(0.0)
    });
    let total: f64 = [20, 24, 30]
        .into_iter()
        .map(|z| concentrations.get(element(z)))
        .sum();
    assert!((total - 1.0e6).abs() < 1.0e-3);
    assert_eq!(concentrations.elements_by_z(), vec![element(20), element(24), element(30)]);
}
