//! Fitting set, curve fitters and the greedy order-dependent solver.

mod cache;
mod fitter;
mod parameters;
mod results;
mod set;
mod solver;

pub use fitter::{CurveFitter, UNDER_CURVE_SIGNIFICANCE};
pub use parameters::{FittingParameters, PeakShape};
pub use results::{FitResult, FitResultSet};
pub use set::{FittingSet, FittingSnapshot};
pub use solver::GreedyFittingSolver;
