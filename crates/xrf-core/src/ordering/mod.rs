//! Fit-order optimization for signatures that compete for the same channels.
//!
//! The greedy solver lets earlier curves claim shared signal first, so the
//! order of overlapping signatures changes the result. Disjoint signatures
//! cannot influence each other and keep their relative order.

mod permutations;

use crate::catalog::SignatureCatalog;
use crate::curve::{ChannelFootprint, Curve, CurveGenerator};
use crate::domain::{EnergyCalibration, EscapePeakType, Signature, SignatureKey};
use crate::fitting::{
    CurveFitter, FitResultSet, FittingParameters, FittingSet, FittingSnapshot,
    GreedyFittingSolver,
};
use permutations::lexicographic_permutations;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Candidates permuted exhaustively per optimizer step.
pub const PERMUTATION_WINDOW: usize = 4;

/// Leading entries of the winning permutation committed per step.
pub const COMMIT_PER_WINDOW: usize = 2;

/// How a candidate permutation of one window is ranked.
///
/// Every variant lets the later permutation win a tie, so among equally
/// scored permutations the last one in lexicographic order is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermutationScoring {
    /// Independent score of the permutation's last signature, fit alone
    /// against the whole spectrum; the lowest wins.
    ///
    /// Only the last entry contributes and the earlier entries never affect
    /// the score, so this ranks a permutation by which signature it leaves for
    /// last. That may not be what the criterion was meant to measure.
    #[default]
    LastElement,
    /// Intensity the permutation's last signature claims after a greedy solve
    /// of the whole permutation on the current residual; the lowest wins.
    LastClaim,
    /// Total intensity claimed by every signature in a greedy solve of the
    /// permutation on the current residual; the highest wins.
    Sum,
}

impl PermutationScoring {
    pub const ALL: [PermutationScoring; 3] = [Self::LastElement, Self::LastClaim, Self::Sum];

    pub const fn name(self) -> &'static str {
        match self {
            Self::LastElement => "last-element",
            Self::LastClaim => "last-claim",
            Self::Sum => "sum",
        }
    }

    /// True when `candidate`, scored after `incumbent`, replaces it.
    pub fn prefers(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::LastElement | Self::LastClaim => candidate <= incumbent,
            Self::Sum => candidate >= incumbent,
        }
    }

    /// Score of a greedy solve of the permutation. Not used by
    /// [`PermutationScoring::LastElement`], which needs no solve.
    fn claimed(self, fit: &FitResultSet) -> f64 {
        match self {
            Self::Sum => fit.iter().map(|result| result.total_intensity()).sum(),
            Self::LastElement | Self::LastClaim => fit
                .results()
                .last()
                .map(|result| result.total_intensity())
                .unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    signature: Signature,
    curve: Curve,
    /// Lone-fit intensity against the spectrum handed to the optimizer.
    independent: f64,
}

/// Reorders a selection so overlapping signatures are solved in a favourable order.
#[derive(Debug, Clone, Copy)]
pub struct OrderingOptimizer {
    generator: CurveGenerator,
    calibration: EnergyCalibration,
    escape: EscapePeakType,
    solver: GreedyFittingSolver,
    scoring: PermutationScoring,
}

impl OrderingOptimizer {
    pub fn new(
        parameters: FittingParameters,
        calibration: EnergyCalibration,
        escape: EscapePeakType,
        fitter: CurveFitter,
    ) -> Self {
        Self {
            generator: CurveGenerator::new(parameters),
            calibration,
            escape,
            solver: GreedyFittingSolver::new(fitter),
            scoring: PermutationScoring::default(),
        }
    }

    pub fn for_snapshot(snapshot: &FittingSnapshot, fitter: CurveFitter) -> Self {
        Self::new(
            snapshot.parameters,
            snapshot.calibration,
            snapshot.escape,
            fitter,
        )
    }

    pub fn with_scoring(mut self, scoring: PermutationScoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn scoring(&self) -> PermutationScoring {
        self.scoring
    }

    /// Intensity `signature` explains when fit alone against `spectrum`.
    pub fn independent_score(&self, signature: &Signature, spectrum: &[f64]) -> f64 {
        let curve = self.curve(signature);
        self.solver.fit_one(spectrum, &curve).total_intensity()
    }

    pub fn footprint(&self, signature: &Signature) -> ChannelFootprint {
        self.generator
            .footprint(signature, &self.calibration, self.escape)
    }

    /// Splits `visible` into signatures whose footprint meets another member's
    /// footprint and those that stand alone. Both keep their input order.
    pub fn partition_overlapping(&self, visible: &[Signature]) -> (Vec<Signature>, Vec<Signature>) {
        let footprints: Vec<ChannelFootprint> =
            visible.iter().map(|signature| self.footprint(signature)).collect();

        let mut overlapping = Vec::new();
        let mut disjoint = Vec::new();
        for (index, signature) in visible.iter().enumerate() {
            let overlaps = footprints.iter().enumerate().any(|(other, footprint)| {
                other != index && footprints[index].intersects(footprint)
            });
            if overlaps {
                overlapping.push(signature.clone());
            } else {
                disjoint.push(signature.clone());
            }
        }
        (overlapping, disjoint)
    }

    /// Optimized order for `signatures`: overlapping visible members first,
    /// then disjoint visible members, then hidden members, each group keeping
    /// every input signature exactly once.
    pub fn optimize(&self, signatures: &[Signature], spectrum: &[f64]) -> Vec<Signature> {
        self.optimize_until(signatures, spectrum, &AtomicBool::new(false))
            .unwrap_or_else(|| signatures.to_vec())
    }

    /// Like [`OrderingOptimizer::optimize`], returning `None` once `stop` is
    /// observed set between permutation windows.
    pub fn optimize_until(
        &self,
        signatures: &[Signature],
        spectrum: &[f64],
        stop: &AtomicBool,
    ) -> Option<Vec<Signature>> {
        let (visible, hidden): (Vec<Signature>, Vec<Signature>) = signatures
            .iter()
            .cloned()
            .partition(|signature| signature.is_visible());
        let (overlapping, disjoint) = self.partition_overlapping(&visible);

        let mut scored: Vec<Candidate> = overlapping
            .into_iter()
            .map(|signature| {
                let curve = self.curve(&signature);
                let independent = self.solver.fit_one(spectrum, &curve).total_intensity();
                Candidate {
                    signature,
                    curve,
                    independent,
                }
            })
            .collect();
        scored.sort_by(|lhs, rhs| rhs.independent.total_cmp(&lhs.independent));

        let mut pool: VecDeque<Candidate> = scored.into_iter().collect();
        let mut ordered = Vec::with_capacity(signatures.len());
        let mut residual = spectrum.to_vec();
        let mut windows = 0_usize;

        while !pool.is_empty() {
            if stop.load(Ordering::Relaxed) {
                debug!(windows, remaining = pool.len(), "ordering optimizer stopped");
                return None;
            }

            let window: Vec<Candidate> = pool
                .drain(..PERMUTATION_WINDOW.min(pool.len()))
                .collect();
            let mut best: Vec<Candidate> = self
                .best_permutation(&window, &residual)
                .into_iter()
                .filter_map(|index| window.get(index).cloned())
                .collect();
            let returned = best.split_off(COMMIT_PER_WINDOW.min(best.len()));

            let committed: Vec<Curve> = best.iter().map(|candidate| candidate.curve.clone()).collect();
            residual = self
                .solver
                .solve(&residual, &committed, &self.calibration)
                .residual()
                .to_vec();
            ordered.extend(best.into_iter().map(|candidate| candidate.signature));
            for candidate in returned.into_iter().rev() {
                pool.push_front(candidate);
            }
            windows += 1;
        }

        debug!(
            windows,
            optimized = ordered.len(),
            disjoint = disjoint.len(),
            hidden = hidden.len(),
            scoring = self.scoring.name(),
            "ordering optimizer finished"
        );
        ordered.extend(disjoint);
        ordered.extend(hidden);
        Some(ordered)
    }

    /// Unselected catalog signatures whose footprint covers `channel`, ranked
    /// by how much of `residual` each would explain on its own.
    pub fn propose_for_channel(
        &self,
        catalog: &dyn SignatureCatalog,
        selected: &[Signature],
        residual: &[f64],
        channel: usize,
    ) -> Vec<(Signature, f64)> {
        let mut proposals: Vec<(Signature, f64)> = catalog
            .all()
            .into_iter()
            .filter(|candidate| !selected.iter().any(|signature| signature == candidate))
            .filter(|candidate| self.footprint(candidate).contains(channel))
            .map(|candidate| {
                let score = self.independent_score(&candidate, residual);
                (candidate, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        proposals.sort_by(|lhs, rhs| rhs.1.total_cmp(&lhs.1).then_with(|| lhs.0.cmp(&rhs.0)));
        proposals
    }

    fn best_permutation(&self, window: &[Candidate], residual: &[f64]) -> Vec<usize> {
        let mut best: Option<(Vec<usize>, f64)> = None;
        for permutation in lexicographic_permutations(window.len()) {
            let score = self.permutation_score(window, &permutation, residual);
            let replace = match &best {
                Some((_, incumbent)) => self.scoring.prefers(score, *incumbent),
                None => true,
            };
            if replace {
                best = Some((permutation, score));
            }
        }
        best.map(|(permutation, _)| permutation).unwrap_or_default()
    }

    fn permutation_score(
        &self,
        window: &[Candidate],
        permutation: &[usize],
        residual: &[f64],
    ) -> f64 {
        if self.scoring == PermutationScoring::LastElement {
            return permutation
                .last()
                .and_then(|index| window.get(*index))
                .map(|candidate| candidate.independent)
                .unwrap_or(0.0);
        }
        let curves: Vec<Curve> = permutation
            .iter()
            .filter_map(|index| window.get(*index).map(|candidate| candidate.curve.clone()))
            .collect();
        self.scoring
            .claimed(&self.solver.solve(residual, &curves, &self.calibration))
    }

    fn curve(&self, signature: &Signature) -> Curve {
        self.generator
            .generate(signature, &self.calibration, self.escape)
    }
}

/// Optimizes `set` against `spectrum` and applies the result. Returns the new
/// order of canonical keys.
pub fn reorder_fitting_set(
    set: &FittingSet,
    spectrum: &[f64],
    fitter: CurveFitter,
    scoring: PermutationScoring,
) -> Vec<SignatureKey> {
    let snapshot = set.snapshot();
    let order: Vec<SignatureKey> = OrderingOptimizer::for_snapshot(&snapshot, fitter)
        .with_scoring(scoring)
        .optimize(&snapshot.signatures, spectrum)
        .iter()
        .map(Signature::key)
        .collect();
    set.replace_order(&order);
    order
}
