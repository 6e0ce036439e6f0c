//! Robust position estimation from distance readings.

use crate::config::{
    validate_confidence, validate_max_iterations, validate_threshold, RobustConfig,
};
use crate::error::EstimateError;
use crate::listener::EstimateListener;
use crate::{refine, runner};
use rloc_core::math::{distance, MatN, PtN, Real};
use rloc_core::reading::RangeReading;
use rloc_core::robust::{Estimator, InliersData, RobustMethod};
use rloc_core::Estimate;
use rloc_linear::solve_inhomogeneous;

/// Consensus problem over ranging readings: closed-form lateration on
/// minimal subsets, scored by distance residuals.
struct RangingProblem<const D: usize>;

impl<const D: usize> Estimator for RangingProblem<D> {
    type Datum = RangeReading<D>;
    type Model = Estimate<D>;

    fn min_samples(&self) -> usize {
        D + 1
    }

    fn fit(&self, data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        let positions: Vec<PtN<D>> = sample.iter().map(|&i| data[i].position).collect();
        let distances: Vec<Real> = sample.iter().map(|&i| data[i].distance).collect();
        solve_inhomogeneous(&positions, &distances)
            .ok()
            .map(Estimate::position_only)
    }

    fn residual(&self, model: &Self::Model, reading: &Self::Datum) -> Real {
        (distance(&model.position, &reading.position) - reading.distance).abs()
    }
}

/// Robust emitter-position estimator over distance readings.
///
/// Lifecycle: configure, call [`estimate`](Self::estimate), read the
/// results. The instance is locked while `estimate()` runs; setters
/// fail fast during that window and the lock is always released before
/// `estimate()` returns. A failed run leaves the results of an earlier
/// successful run untouched.
pub struct RobustRangingEstimator<const D: usize> {
    readings: Vec<RangeReading<D>>,
    config: RobustConfig,
    quality_scores: Option<Vec<Real>>,
    listener: Option<Box<dyn EstimateListener>>,
    locked: bool,
    estimated_position: Option<PtN<D>>,
    estimated_position_covariance: Option<MatN<D>>,
    inliers_data: Option<InliersData>,
}

pub type RobustRangingEstimator2D = RobustRangingEstimator<2>;
pub type RobustRangingEstimator3D = RobustRangingEstimator<3>;

impl<const D: usize> RobustRangingEstimator<D> {
    /// Estimator with the default configuration (PROMedS).
    pub fn new(readings: Vec<RangeReading<D>>) -> Self {
        Self::base(readings, RobustConfig::default())
    }

    pub fn with_config(
        readings: Vec<RangeReading<D>>,
        config: RobustConfig,
    ) -> Result<Self, EstimateError> {
        config.validate()?;
        Ok(Self::base(readings, config))
    }

    fn base(readings: Vec<RangeReading<D>>, config: RobustConfig) -> Self {
        Self {
            readings,
            config,
            quality_scores: None,
            listener: None,
            locked: false,
            estimated_position: None,
            estimated_position_covariance: None,
            inliers_data: None,
        }
    }

    /// Minimum number of readings required to estimate a position.
    pub fn min_readings(&self) -> usize {
        D + 1
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn check_unlocked(&self) -> Result<(), EstimateError> {
        if self.locked {
            Err(EstimateError::Locked)
        } else {
            Ok(())
        }
    }

    pub fn set_readings(&mut self, readings: Vec<RangeReading<D>>) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.readings = readings;
        Ok(())
    }

    pub fn set_method(&mut self, method: RobustMethod) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.config.method = method;
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: Real) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        validate_threshold(threshold)?;
        self.config.threshold = threshold;
        Ok(())
    }

    pub fn set_confidence(&mut self, confidence: Real) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        validate_confidence(confidence)?;
        self.config.confidence = confidence;
        Ok(())
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        validate_max_iterations(max_iterations)?;
        self.config.max_iterations = max_iterations;
        Ok(())
    }

    pub fn set_refine(&mut self, refine: bool) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.config.refine = refine;
        Ok(())
    }

    pub fn set_keep_covariance(&mut self, keep: bool) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.config.keep_covariance = keep;
        Ok(())
    }

    pub fn set_preliminary_subset_size(&mut self, size: usize) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.config.preliminary_subset_size = size;
        Ok(())
    }

    /// Per-reading quality scores for PROSAC/PROMedS (higher is
    /// better). Must match the reading count.
    pub fn set_quality_scores(&mut self, scores: Option<Vec<Real>>) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        if let Some(scores) = &scores {
            if scores.len() != self.readings.len() {
                return Err(EstimateError::InvalidConfig(
                    "quality scores must match the reading count",
                ));
            }
        }
        self.quality_scores = scores;
        Ok(())
    }

    pub fn set_listener(
        &mut self,
        listener: Option<Box<dyn EstimateListener>>,
    ) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.listener = listener;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.readings.len() >= self.min_readings()
            && (!self.config.method.requires_quality_scores()
                || self
                    .quality_scores
                    .as_ref()
                    .is_some_and(|q| q.len() == self.readings.len()))
    }

    /// Run the robust estimation. Blocking; the instance is locked for
    /// the duration of the call.
    pub fn estimate(&mut self) -> Result<(), EstimateError> {
        if self.locked {
            return Err(EstimateError::Locked);
        }
        if !self.is_ready() {
            return Err(EstimateError::NotReady);
        }

        self.locked = true;
        if let Some(listener) = self.listener.as_mut() {
            listener.on_estimate_start();
        }
        let outcome = self.run_locked();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_estimate_end();
        }
        self.locked = false;

        let (position, covariance, inliers) = outcome?;
        self.estimated_position = Some(position);
        self.estimated_position_covariance = covariance;
        self.inliers_data = Some(inliers);
        Ok(())
    }

    fn run_locked(&mut self) -> Result<(PtN<D>, Option<MatN<D>>, InliersData), EstimateError> {
        let problem = RangingProblem::<D>;
        let (model, inliers) = runner::run_consensus(
            &problem,
            &self.readings,
            self.quality_scores.as_deref(),
            &self.config,
            &mut self.listener,
        )?;
        let (position, covariance) =
            refine::refine_position(&self.readings, &inliers, &model.position, &self.config);
        Ok((position, covariance, inliers))
    }

    pub fn estimated_position(&self) -> Option<&PtN<D>> {
        self.estimated_position.as_ref()
    }

    pub fn estimated_position_covariance(&self) -> Option<&MatN<D>> {
        self.estimated_position_covariance.as_ref()
    }

    pub fn inliers_data(&self) -> Option<&InliersData> {
        self.inliers_data.as_ref()
    }

    pub fn readings(&self) -> &[RangeReading<D>] {
        &self.readings
    }

    pub fn config(&self) -> &RobustConfig {
        &self.config
    }
}
