use super::cache::CachedValue;
use super::fitter::CurveFitter;
use super::parameters::FittingParameters;
use super::results::FitResultSet;
use super::solver::GreedyFittingSolver;
use crate::curve::{Curve, CurveGenerator};
use crate::domain::{
    EnergyCalibration, EnergyCalibrationError, EscapePeakType, Signature, SignatureKey, XrfError,
    XrfResult,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct FittingState {
    signatures: Vec<Signature>,
    calibration: EnergyCalibration,
    escape: EscapePeakType,
    parameters: FittingParameters,
}

impl FittingState {
    fn position(&self, key: SignatureKey) -> Option<usize> {
        self.signatures
            .iter()
            .position(|signature| signature.key() == key)
    }

    fn build_curves(&self) -> Vec<Curve> {
        let generator = CurveGenerator::new(self.parameters);
        self.signatures
            .iter()
            .map(|signature| generator.generate(signature, &self.calibration, self.escape))
            .collect()
    }

    fn move_up(&mut self, key: SignatureKey) -> bool {
        match self.position(key) {
            Some(index) if index > 0 => {
                let signature = self.signatures.remove(index);
                self.signatures.insert(index - 1, signature);
                true
            }
            _ => false,
        }
    }

    fn move_down(&mut self, key: SignatureKey) -> bool {
        match self.position(key) {
            Some(index) if index + 1 < self.signatures.len() => {
                let signature = self.signatures.remove(index);
                self.signatures.insert(index + 1, signature);
                true
            }
            _ => false,
        }
    }
}

/// Immutable copy of a fitting set, safe to hand to worker threads.
#[derive(Debug, Clone)]
pub struct FittingSnapshot {
    pub signatures: Vec<Signature>,
    pub calibration: EnergyCalibration,
    pub escape: EscapePeakType,
    pub parameters: FittingParameters,
    pub curves: Vec<Curve>,
}

impl FittingSnapshot {
    pub fn visible_curves(&self) -> Vec<Curve> {
        self.curves
            .iter()
            .filter(|curve| curve.signature().is_visible())
            .cloned()
            .collect()
    }
}

/// Ordered selection of signatures with a lazily rebuilt curve cache.
///
/// List order is fit priority. Every mutation goes through one coarse state
/// lock and, when it changes the state, invalidates the curve cache while that
/// lock is held. Readers of
/// [`FittingSet::curves`] first consult the cache without taking the state
/// lock; on a miss they take it, re-check, and rebuild at most once per
/// invalidation. Callers always receive their own copy of the curve list.
#[derive(Debug)]
pub struct FittingSet {
    state: Mutex<FittingState>,
    curves: CachedValue<Vec<Curve>>,
}

impl Default for FittingSet {
    fn default() -> Self {
        Self::new(EnergyCalibration::zero(), EscapePeakType::None)
    }
}

impl FittingSet {
    pub fn new(calibration: EnergyCalibration, escape: EscapePeakType) -> Self {
        Self {
            state: Mutex::new(FittingState {
                calibration,
                escape,
                ..FittingState::default()
            }),
            curves: CachedValue::new(),
        }
    }

    /// Appends `signature` unless its canonical key is already selected.
    pub fn add_signature(&self, signature: Signature) -> bool {
        let mut state = self.lock_state();
        if state.position(signature.key()).is_some() {
            return false;
        }
        state.signatures.push(signature);
        self.curves.invalidate();
        true
    }

    pub fn add_all(&self, signatures: impl IntoIterator<Item = Signature>) -> usize {
        let mut state = self.lock_state();
        let mut added = 0;
        for signature in signatures {
            if state.position(signature.key()).is_none() {
                state.signatures.push(signature);
                added += 1;
            }
        }
        if added > 0 {
            self.curves.invalidate();
        }
        added
    }

    pub fn remove(&self, key: SignatureKey) -> bool {
        let mut state = self.lock_state();
        let Some(index) = state.position(key) else {
            return false;
        };
        state.signatures.remove(index);
        self.curves.invalidate();
        true
    }

    pub fn clear(&self) {
        let mut state = self.lock_state();
        if state.signatures.is_empty() {
            return;
        }
        state.signatures.clear();
        self.curves.invalidate();
    }

    /// Returns false when `key` is not selected. Setting the visibility a
    /// signature already has leaves the curve cache valid.
    pub fn set_visibility(&self, key: SignatureKey, visible: bool) -> bool {
        let mut state = self.lock_state();
        let Some(index) = state.position(key) else {
            return false;
        };
        if state.signatures[index].is_visible() != visible {
            state.signatures[index].set_visible(visible);
            self.curves.invalidate();
        }
        true
    }

    pub fn move_up(&self, key: SignatureKey) -> bool {
        let mut state = self.lock_state();
        let moved = state.move_up(key);
        if moved {
            self.curves.invalidate();
        }
        moved
    }

    pub fn move_down(&self, key: SignatureKey) -> bool {
        let mut state = self.lock_state();
        let moved = state.move_down(key);
        if moved {
            self.curves.invalidate();
        }
        moved
    }

    /// Moves each key up by one in list order, stopping at the first key that
    /// cannot move. Returns how many keys moved.
    pub fn move_all_up(&self, keys: &[SignatureKey]) -> usize {
        let mut state = self.lock_state();
        let moved = keys.iter().take_while(|key| state.move_up(**key)).count();
        if moved > 0 {
            self.curves.invalidate();
        }
        moved
    }

    /// Moves each key down by one, last key first, stopping at the first key
    /// that cannot move. Returns how many keys moved.
    pub fn move_all_down(&self, keys: &[SignatureKey]) -> usize {
        let mut state = self.lock_state();
        let moved = keys
            .iter()
            .rev()
            .take_while(|key| state.move_down(**key))
            .count();
        if moved > 0 {
            self.curves.invalidate();
        }
        moved
    }

    /// Puts the selected members of `order` first, in that order, followed by
    /// every other selected signature in its current order. Unknown keys are
    /// ignored, so membership never changes.
    pub fn replace_order(&self, order: &[SignatureKey]) {
        let mut state = self.lock_state();
        let before: Vec<SignatureKey> = state.signatures.iter().map(Signature::key).collect();
        let mut remaining = std::mem::take(&mut state.signatures);
        let mut reordered = Vec::with_capacity(remaining.len());
        for key in order {
            if let Some(index) = remaining.iter().position(|signature| signature.key() == *key) {
                reordered.push(remaining.remove(index));
            }
        }
        reordered.append(&mut remaining);
        state.signatures = reordered;
        if !state.signatures.iter().map(Signature::key).eq(before) {
            self.curves.invalidate();
        }
    }

    /// Rejects `max < min` without touching the current calibration.
    pub fn set_calibration(
        &self,
        min_energy: f64,
        max_energy: f64,
        channels: usize,
    ) -> Result<(), EnergyCalibrationError> {
        let calibration = EnergyCalibration::new(min_energy, max_energy, channels)?;
        let mut state = self.lock_state();
        state.calibration = calibration;
        self.curves.invalidate();
        Ok(())
    }

    pub fn set_escape_type(&self, escape: EscapePeakType) {
        let mut state = self.lock_state();
        state.escape = escape;
        self.curves.invalidate();
    }

    pub fn set_parameters(&self, parameters: FittingParameters) -> XrfResult<()> {
        parameters
            .validate()
            .map_err(|message| XrfError::input_validation("INPUT.FITTING_PARAMETERS", message))?;
        let mut state = self.lock_state();
        state.parameters = parameters;
        self.curves.invalidate();
        Ok(())
    }

    /// Read-only copy of the shared parameters; change them with
    /// [`FittingSet::set_parameters`].
    pub fn parameters(&self) -> FittingParameters {
        self.lock_state().parameters
    }

    pub fn calibration(&self) -> EnergyCalibration {
        self.lock_state().calibration
    }

    pub fn escape_type(&self) -> EscapePeakType {
        self.lock_state().escape
    }

    pub fn has_signature(&self, key: SignatureKey) -> bool {
        self.lock_state().position(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().signatures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock_state().signatures.len()
    }

    pub fn fitted_signatures(&self) -> Vec<Signature> {
        self.lock_state().signatures.clone()
    }

    pub fn visible_signatures(&self) -> Vec<Signature> {
        self.lock_state()
            .signatures
            .iter()
            .filter(|signature| signature.is_visible())
            .cloned()
            .collect()
    }

    /// Curves for every selected signature, in selection order.
    pub fn curves(&self) -> Vec<Curve> {
        if let Some(curves) = self.curves.get() {
            return curves;
        }
        let state = self.lock_state();
        self.curves_locked(&state)
    }

    /// Double-checked rebuild; the caller holds the state lock.
    fn curves_locked(&self, state: &FittingState) -> Vec<Curve> {
        if let Some(curves) = self.curves.get() {
            return curves;
        }
        let curves = state.build_curves();
        debug!(
            curves = curves.len(),
            channels = state.calibration.channels(),
            escape = state.escape.as_str(),
            "rebuilt fitting curves"
        );
        self.curves.store(curves.clone());
        curves
    }

    pub fn visible_curves(&self) -> Vec<Curve> {
        self.curves()
            .into_iter()
            .filter(|curve| curve.signature().is_visible())
            .collect()
    }

    /// Number of curve-cache rebuilds since construction.
    pub fn curve_rebuilds(&self) -> usize {
        self.curves.rebuilds()
    }

    pub fn snapshot(&self) -> FittingSnapshot {
        let state = self.lock_state();
        let curves = self.curves_locked(&state);
        FittingSnapshot {
            signatures: state.signatures.clone(),
            calibration: state.calibration,
            escape: state.escape,
            parameters: state.parameters,
            curves,
        }
    }

    /// Fits the visible curves against `spectrum` in selection order.
    pub fn fit(&self, spectrum: &[f64], fitter: CurveFitter) -> FitResultSet {
        let snapshot = self.snapshot();
        GreedyFittingSolver::new(fitter).solve(
            spectrum,
            &snapshot.visible_curves(),
            &snapshot.calibration,
        )
    }

    fn lock_state(&self) -> MutexGuard<'_, FittingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::FittingSet;
    use crate::common::elements::Element;
    use crate::domain::{
        EmissionLine, EnergyCalibration, EnergyCalibrationError, EscapePeakType, ShellType,
        Signature, SignatureKey,
    };
    use crate::fitting::{CurveFitter, FittingParameters};

    fn key(symbol: &str) -> SignatureKey {
        SignatureKey::new(Element::from_symbol(symbol).expect("element"), ShellType::K)
    }

    fn signature(symbol: &str, energy: f64) -> Signature {
        let key = key(symbol);
        Signature::new(key.element, key.shell, vec![EmissionLine::new(energy, 1.0)])
    }

    fn populated() -> FittingSet {
        let set = FittingSet::new(
            EnergyCalibration::new(0.0, 20.48, 2048).expect("calibration"),
            EscapePeakType::None,
        );
        set.add_all([
            signature("Ca", 3.69),
            signature("Fe", 6.40),
            signature("Cu", 8.05),
            signature("Zn", 8.64),
        ]);
        set
    }

    fn order(set: &FittingSet) -> Vec<String> {
        set.fitted_signatures()
            .iter()
            .map(|signature| signature.element().symbol().to_string())
            .collect()
    }

    #[test]
    fn add_is_idempotent_on_canonical_key() {
        let set = populated();
        let rebuilds = {
            set.curves();
            set.curve_rebuilds()
        };

        let decorated = signature("Fe", 6.40).with_visibility(false);
        assert!(!set.add_signature(decorated));
        assert_eq!(set.len(), 4);
        set.curves();
        assert_eq!(set.curve_rebuilds(), rebuilds);
    }

    #[test]
    fn moves_shift_one_position_and_report_boundaries() {
        let set = populated();
        assert!(!set.move_up(key("Ca")));
        assert!(set.move_up(key("Fe")));
        assert_eq!(order(&set), ["Fe", "Ca", "Cu", "Zn"]);
        assert!(!set.move_down(key("Zn")));
        assert!(set.move_down(key("Fe")));
        assert_eq!(order(&set), ["Ca", "Fe", "Cu", "Zn"]);
        assert!(!set.move_up(key("Ni")));
    }

    #[test]
    fn batch_moves_stop_at_first_failure() {
        let set = populated();
        assert_eq!(set.move_all_up(&[key("Fe"), key("Cu")]), 2);
        assert_eq!(order(&set), ["Fe", "Cu", "Ca", "Zn"]);

        let set = populated();
        assert_eq!(set.move_all_up(&[key("Ca"), key("Fe")]), 0);
        assert_eq!(order(&set), ["Ca", "Fe", "Cu", "Zn"]);

        let set = populated();
        assert_eq!(set.move_all_down(&[key("Ca"), key("Fe")]), 2);
        assert_eq!(order(&set), ["Cu", "Ca", "Fe", "Zn"]);

        let set = populated();
        assert_eq!(set.move_all_down(&[key("Ca"), key("Zn")]), 0);
        assert_eq!(order(&set), ["Ca", "Fe", "Cu", "Zn"]);
    }

    #[test]
    fn replace_order_preserves_membership() {
        let set = populated();
        set.replace_order(&[key("Zn"), key("Ni"), key("Fe")]);
        assert_eq!(order(&set), ["Zn", "Fe", "Ca", "Cu"]);
    }

    #[test]
    fn every_mutation_invalidates_and_repeated_reads_do_not_rebuild() {
        let set = populated();
        set.curves();
        set.curves();
        assert_eq!(set.curve_rebuilds(), 1);

        let mutations: Vec<Box<dyn Fn(&FittingSet)>> = vec![
            Box::new(|set: &FittingSet| {
                set.set_visibility(key("Cu"), false);
            }),
            Box::new(|set: &FittingSet| {
                set.move_up(key("Fe"));
            }),
            Box::new(|set: &FittingSet| {
                set.move_down(key("Fe"));
            }),
            Box::new(|set: &FittingSet| set.set_escape_type(EscapePeakType::Silicon)),
            Box::new(|set: &FittingSet| set.set_calibration(0.0, 10.24, 1024).expect("calibration")),
            Box::new(|set: &FittingSet| {
                set.set_parameters(FittingParameters {
                    fwhm_base: 0.1,
                    ..FittingParameters::default()
                })
                .expect("parameters");
            }),
            Box::new(|set: &FittingSet| {
                set.remove(key("Zn"));
            }),
            Box::new(|set: &FittingSet| {
                set.add_signature(signature("Ni", 7.48));
            }),
            Box::new(|set: &FittingSet| set.clear()),
        ];

        for (index, mutate) in mutations.iter().enumerate() {
            let before = set.curve_rebuilds();
            mutate(&set);
            set.curves();
            set.curves();
            assert_eq!(set.curve_rebuilds(), before + 1, "mutation #{index}");
        }
    }

    #[test]
    fn calls_that_change_nothing_keep_the_cache() {
        let set = populated();
        set.curves();
        let rebuilds = set.curve_rebuilds();

        assert!(!set.remove(key("Ni")));
        assert!(set.set_visibility(key("Cu"), true));
        assert!(!set.set_visibility(key("Ni"), false));
        assert!(!set.move_up(key("Ca")));
        assert!(!set.move_down(key("Zn")));
        assert!(!set.move_up(key("Ni")));
        assert_eq!(set.move_all_up(&[key("Ca"), key("Fe")]), 0);
        assert_eq!(set.move_all_down(&[key("Fe"), key("Zn")]), 0);
        set.replace_order(&[key("Ca"), key("Fe")]);
        set.curves();
        assert_eq!(set.curve_rebuilds(), rebuilds);
        assert_eq!(order(&set), ["Ca", "Fe", "Cu", "Zn"]);

        let empty = FittingSet::default();
        empty.curves();
        empty.clear();
        empty.curves();
        assert_eq!(empty.curve_rebuilds(), 1);
    }

    #[test]
    fn inverted_calibration_is_rejected_without_state_change() {
        let set = populated();
        let before = set.calibration();
        assert_eq!(
            set.set_calibration(10.0, 1.0, 512),
            Err(EnergyCalibrationError::InvertedRange { min: 10.0, max: 1.0 })
        );
        assert_eq!(set.calibration(), before);

        let error = set
            .set_parameters(FittingParameters {
                fwhm_base: f64::NAN,
                ..FittingParameters::default()
            })
            .expect_err("NaN width");
        assert_eq!(error.placeholder(), "INPUT.FITTING_PARAMETERS");
        assert_eq!(set.parameters(), FittingParameters::default());
    }

    #[test]
    fn visible_views_and_fit_skip_hidden_signatures() {
        let set = populated();
        set.set_visibility(key("Cu"), false);
        assert_eq!(set.visible_signatures().len(), 3);
        assert_eq!(set.visible_curves().len(), 3);
        assert_eq!(set.curves().len(), 4);

        let spectrum = vec![0.0; 2048];
        let fit = set.fit(&spectrum, CurveFitter::LeastSquares);
        assert_eq!(fit.len(), 3);
        assert!(fit.result_for(key("Cu")).is_none());
    }

    #[test]
    fn concurrent_readers_never_observe_mixed_snapshots() {
        let set = populated();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let curves = set.curves();
                        let channels = curves.first().map(|curve| curve.len()).unwrap_or(0);
                        assert!(channels == 2048 || channels == 1024 || curves.is_empty());
                        assert!(curves.iter().all(|curve| curve.len() == channels));
                    }
                });
            }
            scope.spawn(|| {
                for round in 0..50 {
                    let channels = if round % 2 == 0 { 1024 } else { 2048 };
                    set.set_calibration(0.0, channels as f64 / 100.0, channels)
                        .expect("calibration");
                    set.move_down(key("Ca"));
                }
            });
        });

        let snapshot = set.snapshot();
        assert_eq!(snapshot.curves.len(), snapshot.signatures.len());
        assert!(
            snapshot
                .curves
                .iter()
                .all(|curve| curve.len() == snapshot.calibration.channels())
        );
    }
}
