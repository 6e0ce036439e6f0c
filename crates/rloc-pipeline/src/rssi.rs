//! Robust estimation from received-signal-strength readings.
//!
//! Depending on the enable flags this estimates the emitter position,
//! its transmitted power and the channel path-loss exponent. Position
//! estimation can be disabled and pinned, which is how the sequential
//! orchestrator runs this estimator on top of a ranging fix.

use crate::config::{validate_path_loss, validate_threshold, RssiConfig};
use crate::error::EstimateError;
use crate::listener::EstimateListener;
use crate::refine::{self, RadiatedRefineOutcome};
use crate::runner;
use nalgebra::DMatrix;
use rloc_core::math::{distance, MatN, PtN, Real};
use rloc_core::propagation::{distance_from_rssi, rssi_predictor};
use rloc_core::reading::RssiReading;
use rloc_core::robust::{Estimator, InliersData, RobustMethod};
use rloc_core::Estimate;
use rloc_linear::{fit_rssi_params, solve_inhomogeneous};
use rloc_optim::RssiSample;

/// Consensus problem over RSSI readings.
///
/// Preliminary fits convert RSSI to distance with the initial radiated
/// parameters, laterate the position (unless pinned), then solve the
/// enabled radiated parameters in closed form given that position.
/// Residuals are RSSI-domain.
struct RssiConsensusProblem<const D: usize> {
    estimate_position: bool,
    estimate_tx_power: bool,
    estimate_path_loss: bool,
    pinned_position: PtN<D>,
    initial_tx_power_dbm: Real,
    initial_path_loss: Real,
}

impl<const D: usize> RssiConsensusProblem<D> {
    /// Readings needed for one preliminary fit: `D + 1` for the
    /// lateration when the position is estimated, plus one per enabled
    /// radiated parameter.
    fn required_readings(&self) -> usize {
        (if self.estimate_position { D + 1 } else { 0 })
            + usize::from(self.estimate_tx_power)
            + usize::from(self.estimate_path_loss)
    }
}

impl<const D: usize> Estimator for RssiConsensusProblem<D> {
    type Datum = RssiReading<D>;
    type Model = Estimate<D>;

    fn min_samples(&self) -> usize {
        self.required_readings().max(1)
    }

    fn fit(&self, data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        let position = if self.estimate_position {
            let mut positions = Vec::with_capacity(sample.len());
            let mut distances = Vec::with_capacity(sample.len());
            for &i in sample {
                let r = &data[i];
                positions.push(r.position);
                distances.push(distance_from_rssi(
                    r.source.free_space_constant(),
                    r.rssi_dbm,
                    self.initial_tx_power_dbm,
                    self.initial_path_loss,
                ));
            }
            solve_inhomogeneous(&positions, &distances).ok()?
        } else {
            self.pinned_position
        };

        let mut predictors = Vec::with_capacity(sample.len());
        let mut rssis = Vec::with_capacity(sample.len());
        for &i in sample {
            let r = &data[i];
            let d = distance(&position, &r.position);
            predictors.push(rssi_predictor(r.source.free_space_constant(), d));
            rssis.push(r.rssi_dbm);
        }
        let params = fit_rssi_params(
            &predictors,
            &rssis,
            self.estimate_tx_power,
            self.estimate_path_loss,
            self.initial_tx_power_dbm,
            self.initial_path_loss,
        )
        .ok()?;

        Some(Estimate::new(
            position,
            Some(params.tx_power_dbm),
            Some(params.path_loss_exponent),
        ))
    }

    fn residual(&self, model: &Self::Model, reading: &Self::Datum) -> Real {
        let k = reading.source.free_space_constant();
        let g = rssi_predictor(k, distance(&model.position, &reading.position));
        let expected = model.tx_power_or(self.initial_tx_power_dbm)
            + model.path_loss_or(self.initial_path_loss) * g;
        (reading.rssi_dbm - expected).abs()
    }
}

/// Robust estimator over RSSI readings.
///
/// Same lifecycle and locking discipline as
/// [`RobustRangingEstimator`](crate::RobustRangingEstimator).
pub struct RobustRssiEstimator<const D: usize> {
    readings: Vec<RssiReading<D>>,
    config: RssiConfig<D>,
    quality_scores: Option<Vec<Real>>,
    listener: Option<Box<dyn EstimateListener>>,
    locked: bool,
    estimated: Option<Estimate<D>>,
    position_covariance: Option<MatN<D>>,
    tx_power_variance: Option<Real>,
    path_loss_variance: Option<Real>,
    active_covariance: Option<DMatrix<Real>>,
    inliers_data: Option<InliersData>,
}

pub type RobustRssiEstimator2D = RobustRssiEstimator<2>;
pub type RobustRssiEstimator3D = RobustRssiEstimator<3>;

impl<const D: usize> RobustRssiEstimator<D> {
    pub fn new(readings: Vec<RssiReading<D>>) -> Self {
        Self::base(readings, RssiConfig::default())
    }

    pub fn with_config(
        readings: Vec<RssiReading<D>>,
        config: RssiConfig<D>,
    ) -> Result<Self, EstimateError> {
        config.validate()?;
        Ok(Self::base(readings, config))
    }

    fn base(readings: Vec<RssiReading<D>>, config: RssiConfig<D>) -> Self {
        Self {
            readings,
            config,
            quality_scores: None,
            listener: None,
            locked: false,
            estimated: None,
            position_covariance: None,
            tx_power_variance: None,
            path_loss_variance: None,
            active_covariance: None,
            inliers_data: None,
        }
    }

    /// Minimum number of readings: `D + 1` for the position when
    /// estimated, plus one per enabled radiated parameter.
    pub fn min_readings(&self) -> usize {
        let c = &self.config;
        let n = (if c.estimate_position { D + 1 } else { 0 })
            + usize::from(c.estimate_tx_power)
            + usize::from(c.estimate_path_loss);
        n.max(1)
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

    pub fn set_readings(&mut self, readings: Vec<RssiReading<D>>) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.readings = readings;
        Ok(())
    }

    /// Replace the whole configuration after validating it.
    pub fn set_config(&mut self, config: RssiConfig<D>) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_method(&mut self, method: RobustMethod) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.config.robust.method = method;
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: Real) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        validate_threshold(threshold)?;
        self.config.robust.threshold = threshold;
        Ok(())
    }

    pub fn set_initial_position(
        &mut self,
        position: Option<PtN<D>>,
    ) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.config.initial_position = position;
        Ok(())
    }

    pub fn set_initial_tx_power_dbm(&mut self, dbm: Option<Real>) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.config.initial_tx_power_dbm = dbm;
        Ok(())
    }

    pub fn set_initial_path_loss(&mut self, exponent: Real) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        validate_path_loss(exponent)?;
        self.config.initial_path_loss = exponent;
        Ok(())
    }

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
        let c = &self.config;
        let anything_enabled =
            c.estimate_position || c.estimate_tx_power || c.estimate_path_loss;
        let quality_ok = !c.robust.method.requires_quality_scores()
            || self
                .quality_scores
                .as_ref()
                .is_some_and(|q| q.len() == self.readings.len());
        let position_ok = c.estimate_position || c.initial_position.is_some();
        // The transmitted power seed is needed to turn RSSI into
        // distance for preliminary lateration, and as the pinned value
        // when power is not estimated.
        let tx_power_ok = c.initial_tx_power_dbm.is_some()
            || (!c.estimate_position && c.estimate_tx_power);

        anything_enabled
            && quality_ok
            && position_ok
            && tx_power_ok
            && self.readings.len() >= self.min_readings()
    }

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

        let (refined, inliers) = outcome?;
        self.estimated = Some(refined.estimate);
        self.position_covariance = refined.position_covariance;
        self.tx_power_variance = refined.tx_power_variance;
        self.path_loss_variance = refined.path_loss_variance;
        self.active_covariance = refined.active_covariance;
        self.inliers_data = Some(inliers);
        Ok(())
    }

    fn run_locked(
        &mut self,
    ) -> Result<(RadiatedRefineOutcome<D>, InliersData), EstimateError> {
        let config = self.config.clone();
        let problem = RssiConsensusProblem {
            estimate_position: config.estimate_position,
            estimate_tx_power: config.estimate_tx_power,
            estimate_path_loss: config.estimate_path_loss,
            pinned_position: config.initial_position.unwrap_or_else(PtN::origin),
            initial_tx_power_dbm: config.initial_tx_power_dbm.unwrap_or(0.0),
            initial_path_loss: config.initial_path_loss,
        };

        let (model, inliers) = runner::run_consensus(
            &problem,
            &self.readings,
            self.quality_scores.as_deref(),
            &config.robust,
            &mut self.listener,
        )?;

        let samples: Vec<RssiSample<D>> = self
            .readings
            .iter()
            .map(|r| RssiSample {
                position: r.position,
                rssi_dbm: r.rssi_dbm,
                k: r.source.free_space_constant(),
                std_dev: r.rssi_std_dev.unwrap_or(1.0),
            })
            .collect();
        let refined = refine::refine_rssi(
            &samples,
            &inliers.mask,
            &model,
            config.estimate_position,
            config.estimate_tx_power,
            config.estimate_path_loss,
            &config.robust,
        );
        Ok((refined, inliers))
    }

    pub fn estimated_position(&self) -> Option<&PtN<D>> {
        self.estimated.as_ref().map(|e| &e.position)
    }

    pub fn estimated_position_covariance(&self) -> Option<&MatN<D>> {
        self.position_covariance.as_ref()
    }

    pub fn estimated_tx_power_dbm(&self) -> Option<Real> {
        self.estimated.as_ref().and_then(|e| e.tx_power_dbm)
    }

    pub fn estimated_tx_power_variance(&self) -> Option<Real> {
        self.tx_power_variance
    }

    pub fn estimated_path_loss_exponent(&self) -> Option<Real> {
        self.estimated.as_ref().and_then(|e| e.path_loss_exponent)
    }

    pub fn estimated_path_loss_variance(&self) -> Option<Real> {
        self.path_loss_variance
    }

    /// Covariance of the active parameter vector (position dims first,
    /// then power, then path loss), when refinement produced one.
    pub fn estimated_covariance(&self) -> Option<&DMatrix<Real>> {
        self.active_covariance.as_ref()
    }

    pub fn inliers_data(&self) -> Option<&InliersData> {
        self.inliers_data.as_ref()
    }

    pub fn readings(&self) -> &[RssiReading<D>] {
        &self.readings
    }

    pub fn config(&self) -> &RssiConfig<D> {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rloc_core::math::Pt2;
    use rloc_core::propagation::{expected_rssi_dbm, free_space_constant};
    use rloc_core::source::RadioSource;

    fn readings_for(target: &Pt2, tx_power: Real, path_loss: Real) -> Vec<RssiReading<2>> {
        let k = free_space_constant(2.4e9);
        [
            Pt2::new(0.0, 0.0),
            Pt2::new(10.0, 0.0),
            Pt2::new(10.0, 10.0),
            Pt2::new(0.0, 10.0),
            Pt2::new(5.0, 0.0),
            Pt2::new(0.0, 5.0),
        ]
        .iter()
        .map(|p| {
            RssiReading::new(
                RadioSource::new("ap", 2.4e9).unwrap(),
                *p,
                expected_rssi_dbm(k, distance(p, target), tx_power, path_loss),
            )
            .unwrap()
        })
        .collect()
    }

    #[test]
    fn min_readings_grows_with_enabled_parameters() {
        let mut config = RssiConfig::<2>::default();
        config.estimate_tx_power = false;
        config.estimate_path_loss = false;
        config.initial_tx_power_dbm = Some(-10.0);
        let est = RobustRssiEstimator::with_config(vec![], config.clone()).unwrap();
        assert_eq!(est.min_readings(), 3);

        config.estimate_tx_power = true;
        let est = RobustRssiEstimator::with_config(vec![], config.clone()).unwrap();
        assert_eq!(est.min_readings(), 4);

        config.estimate_path_loss = true;
        let est = RobustRssiEstimator::with_config(vec![], config.clone()).unwrap();
        assert_eq!(est.min_readings(), 5);

        config.estimate_position = false;
        let est = RobustRssiEstimator::with_config(vec![], config).unwrap();
        assert_eq!(est.min_readings(), 2);
    }

    #[test]
    fn pinned_position_requires_initial_position() {
        let target = Pt2::new(5.0, 5.0);
        let mut config = RssiConfig::<2>::default();
        config.robust.method = RobustMethod::Ransac;
        config.estimate_position = false;
        let mut est =
            RobustRssiEstimator::with_config(readings_for(&target, -10.0, 2.0), config).unwrap();
        assert!(!est.is_ready());
        est.set_initial_position(Some(target)).unwrap();
        assert!(est.is_ready());
    }

    #[test]
    fn position_estimation_requires_tx_power_seed() {
        let target = Pt2::new(5.0, 5.0);
        let mut config = RssiConfig::<2>::default();
        config.robust.method = RobustMethod::Ransac;
        let mut est =
            RobustRssiEstimator::with_config(readings_for(&target, -10.0, 2.0), config).unwrap();
        assert!(!est.is_ready());
        est.set_initial_tx_power_dbm(Some(-10.0)).unwrap();
        assert!(est.is_ready());
    }

    #[test]
    fn estimates_radiated_parameters_with_pinned_position() {
        let target = Pt2::new(5.0, 5.0);
        let mut config = RssiConfig::<2>::default();
        config.robust.method = RobustMethod::Ransac;
        config.robust.threshold = 1.0;
        config.estimate_position = false;
        config.estimate_tx_power = true;
        config.estimate_path_loss = true;
        config.initial_position = Some(target);
        let mut est =
            RobustRssiEstimator::with_config(readings_for(&target, -12.0, 2.4), config).unwrap();
        est.estimate().unwrap();
        assert!((est.estimated_tx_power_dbm().unwrap() - -12.0).abs() < 1e-6);
        assert!((est.estimated_path_loss_exponent().unwrap() - 2.4).abs() < 1e-6);
        assert!(est.estimated_tx_power_variance().is_some());
        assert!(est.estimated_path_loss_variance().is_some());
        // Position was pinned, so no position covariance block exists.
        assert!(est.estimated_position_covariance().is_none());
        assert_eq!(est.inliers_data().unwrap().num_inliers, 6);
    }

    #[test]
    fn estimates_position_and_power_from_rssi() {
        let target = Pt2::new(4.0, 6.0);
        let mut config = RssiConfig::<2>::default();
        config.robust.method = RobustMethod::Ransac;
        config.robust.threshold = 1.0;
        config.initial_tx_power_dbm = Some(-10.0);
        let mut est =
            RobustRssiEstimator::with_config(readings_for(&target, -10.0, 2.0), config).unwrap();
        est.estimate().unwrap();
        let p = est.estimated_position().unwrap();
        assert!(distance(p, &target) < 1e-3, "got {:?}", p);
        assert!((est.estimated_tx_power_dbm().unwrap() - -10.0).abs() < 1e-3);
    }
}
