//! Generic, model-agnostic robust consensus engine.
//!
//! To use this module, implement the [`Estimator`] trait for your model
//! and call [`robust_fit`] with a slice of input data, a
//! [`RobustMethod`] and some [`RobustOptions`].
//!
//! Five consensus methods are provided behind one engine:
//! - [`RobustMethod::Ransac`] — inlier-count scoring, uniform sampling;
//! - [`RobustMethod::Msac`] — capped total-cost scoring, more tolerant
//!   of a loose threshold;
//! - [`RobustMethod::Prosac`] — inlier-count scoring with
//!   quality-ordered progressive sampling (requires quality scores);
//! - [`RobustMethod::Lmeds`] — least-median-of-residuals scoring, no
//!   user threshold;
//! - [`RobustMethod::Promeds`] — median scoring with quality-ordered
//!   sampling (requires quality scores).
//!
//! The engine is deliberately infallible: when consensus is not found
//! (too little data, every subset degenerate, missing quality scores)
//! it returns a [`RobustResult`] with `model == None` rather than
//! panicking or erroring. A degenerate subset is an expected outcome of
//! an iteration, not an error.

mod median;
mod sampling;
mod threshold;

use crate::math::Real;
use serde::{Deserialize, Serialize};

/// Generic estimator for consensus methods.
///
/// Implement this for your models; the pipeline crates implement it for
/// ranging, RSSI and hybrid reading sets.
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to fit a model. May depend on
    /// estimator configuration (dimensionality, enabled parameters).
    fn min_samples(&self) -> usize;

    /// Fit a model from a subset of data indices.
    ///
    /// Return `None` if the subset is degenerate or fitting fails; the
    /// engine treats that as "no candidate this iteration".
    fn fit(&self, data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Residual for one datum: a non-negative scalar, smaller is better,
    /// in the same units as [`RobustOptions::threshold`].
    fn residual(&self, model: &Self::Model, datum: &Self::Datum) -> Real;
}

/// Consensus method governing sampling order and acceptance scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobustMethod {
    Ransac,
    Msac,
    Prosac,
    Lmeds,
    #[default]
    Promeds,
}

impl RobustMethod {
    /// Whether this method samples in quality order and therefore
    /// requires per-datum quality scores.
    pub fn requires_quality_scores(self) -> bool {
        matches!(self, RobustMethod::Prosac | RobustMethod::Promeds)
    }

    /// Whether this method uses the user-provided residual threshold
    /// (as opposed to median-based scoring).
    pub fn uses_threshold(self) -> bool {
        matches!(
            self,
            RobustMethod::Ransac | RobustMethod::Msac | RobustMethod::Prosac
        )
    }
}

/// Configuration parameters for the consensus engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustOptions {
    /// Hard cap on iterations; threshold methods may stop earlier once
    /// the adaptive confidence bound is reached.
    pub max_iterations: usize,
    /// Desired confidence in `[0, 1)` of having sampled at least one
    /// all-inlier subset.
    pub confidence: Real,
    /// Inlier residual threshold (threshold methods only).
    pub threshold: Real,
    /// Early-stop bound on the best median residual (median methods
    /// only); `0` disables the early stop.
    pub stop_threshold: Real,
    /// Multiplier on the robust scale used to report inliers for
    /// median methods. Reporting-only: never influences which model
    /// wins.
    pub inlier_factor: Real,
    /// Subset size for preliminary fits; values below the estimator's
    /// minimum are raised to it. `0` means minimal subsets.
    pub subset_size: usize,
    /// Minimum progress increase (fraction of the iteration budget)
    /// between two progress events.
    pub progress_delta: Real,
    /// Random-number generator seed (for reproducibility).
    pub seed: u64,
}

impl Default for RobustOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            confidence: 0.99,
            threshold: 1.0,
            stop_threshold: 0.0,
            inlier_factor: 2.5,
            subset_size: 0,
            progress_delta: 0.05,
            seed: 1_234_567,
        }
    }
}

/// Observability event fired from inside the consensus loop.
///
/// Events carry no control-flow significance; callbacks must not
/// attempt to mutate the estimator that is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RobustEvent {
    /// A new iteration started (1-based).
    Iteration(usize),
    /// Fraction of the current iteration budget consumed, in `[0, 1]`.
    Progress(Real),
}

/// Output of a consensus run.
///
/// `model` is `None` when no consensus was found; the other fields are
/// then zeroed/infinite.
#[derive(Debug, Clone)]
pub struct RobustResult<M> {
    /// Best model found, if any.
    pub model: Option<M>,
    /// Inlier membership mask, one entry per datum.
    pub inliers: Vec<bool>,
    /// Number of `true` entries in `inliers`.
    pub num_inliers: usize,
    /// Winning score: inlier RMS (RANSAC/PROSAC), capped cost (MSAC)
    /// or median residual (LMedS/PROMedS).
    pub best_score: Real,
    /// Number of iterations actually performed.
    pub iterations: usize,
}

impl<M> RobustResult<M> {
    pub(crate) fn empty(num_data: usize) -> Self {
        Self {
            model: None,
            inliers: vec![false; num_data],
            num_inliers: 0,
            best_score: Real::INFINITY,
            iterations: 0,
        }
    }

    /// Inlier bookkeeping of this run, detached from the model type.
    pub fn inliers_data(&self) -> InliersData {
        InliersData {
            mask: self.inliers.clone(),
            num_inliers: self.num_inliers,
            best_score: self.best_score,
        }
    }
}

/// Inlier membership plus the winning threshold/median score of one
/// consensus run.
#[derive(Debug, Clone)]
pub struct InliersData {
    /// Membership mask, one entry per reading.
    pub mask: Vec<bool>,
    pub num_inliers: usize,
    /// Winning score of the run that produced this mask.
    pub best_score: Real,
}

impl InliersData {
    /// Indices of the inlier readings.
    pub fn inlier_indices(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(i, &inl)| inl.then_some(i))
            .collect()
    }
}

/// Run the consensus engine for a given [`Estimator`] implementation.
///
/// `quality_scores` is consulted only by PROSAC/PROMedS and must then
/// have exactly one entry per datum (higher is better); otherwise the
/// run fails with `model == None`. `events`, when provided, receives
/// per-iteration and progress notifications.
pub fn robust_fit<E: Estimator>(
    method: RobustMethod,
    estimator: &E,
    data: &[E::Datum],
    quality_scores: Option<&[Real]>,
    opts: &RobustOptions,
    events: Option<&mut dyn FnMut(RobustEvent)>,
) -> RobustResult<E::Model> {
    let mut noop = |_: RobustEvent| {};
    let events = events.unwrap_or(&mut noop);
    match method {
        RobustMethod::Ransac | RobustMethod::Msac | RobustMethod::Prosac => {
            threshold::run(method, estimator, data, quality_scores, opts, events)
        }
        RobustMethod::Lmeds | RobustMethod::Promeds => {
            median::run(method, estimator, data, quality_scores, opts, events)
        }
    }
}

/// Adaptive iteration bound from the current inlier ratio: number of
/// iterations needed to reach `confidence` of having drawn at least one
/// all-inlier subset of `subset_size`.
pub(crate) fn adaptive_iteration_bound(
    confidence: Real,
    inlier_ratio: Real,
    subset_size: usize,
    iters_so_far: usize,
    max_iterations: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iterations;
    }

    let w = inlier_ratio.min(1.0);
    let denom = (1.0 - w.powf(subset_size as Real)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iterations;
    }

    let needed = ((1.0 - confidence).ln() / denom).ceil() as usize;
    needed.clamp(iters_so_far, max_iterations)
}

/// Shared iteration/progress event bookkeeping.
pub(crate) struct ProgressTracker {
    delta: Real,
    last: Real,
}

impl ProgressTracker {
    pub(crate) fn new(delta: Real) -> Self {
        Self { delta, last: 0.0 }
    }

    pub(crate) fn step(
        &mut self,
        iteration: usize,
        current_max: usize,
        events: &mut dyn FnMut(RobustEvent),
    ) {
        events(RobustEvent::Iteration(iteration));
        let progress = iteration as Real / current_max.max(1) as Real;
        if progress - self.last >= self.delta {
            self.last = progress;
            events(RobustEvent::Progress(progress.min(1.0)));
        }
    }
}
