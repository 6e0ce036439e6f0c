//! Sequential position-then-power orchestrator.
//!
//! Runs two independent robust estimations: a ranging-only pass fixes
//! the emitter position, then an RSSI-only pass with that position
//! pinned estimates the radiated parameters. Decoupling the two keeps
//! the power/path-loss fit conditioned on a stable position. The two
//! stages are treated as independent, so the combined covariance is
//! block-diagonal with zero cross-terms.

use crate::config::{RssiConfig, SequentialConfig};
use crate::error::EstimateError;
use crate::listener::EstimateListener;
use crate::ranging::RobustRangingEstimator;
use crate::rssi::RobustRssiEstimator;
use nalgebra::DMatrix;
use rloc_core::math::{MatN, PtN, Real};
use rloc_core::reading::HybridReading;
use rloc_core::robust::InliersData;

struct SequentialOutcome<const D: usize> {
    position: PtN<D>,
    position_covariance: Option<MatN<D>>,
    tx_power_dbm: Option<Real>,
    tx_power_variance: Option<Real>,
    path_loss_exponent: Option<Real>,
    path_loss_variance: Option<Real>,
    combined_covariance: Option<DMatrix<Real>>,
    position_inliers: Option<InliersData>,
    radiated_inliers: Option<InliersData>,
}

/// Orchestrator over hybrid readings; see the module docs.
///
/// Getters only reflect a fully completed run: a failure in either
/// stage propagates as the overall error and commits nothing.
pub struct SequentialHybridEstimator<const D: usize> {
    readings: Vec<HybridReading<D>>,
    config: SequentialConfig,
    quality_scores: Option<Vec<Real>>,
    listener: Option<Box<dyn EstimateListener>>,
    locked: bool,
    result: Option<SequentialOutcome<D>>,
}

pub type SequentialHybridEstimator2D = SequentialHybridEstimator<2>;
pub type SequentialHybridEstimator3D = SequentialHybridEstimator<3>;

impl<const D: usize> SequentialHybridEstimator<D> {
    pub fn new(readings: Vec<HybridReading<D>>) -> Self {
        Self::base(readings, SequentialConfig::default())
    }

    pub fn with_config(
        readings: Vec<HybridReading<D>>,
        config: SequentialConfig,
    ) -> Result<Self, EstimateError> {
        config.validate()?;
        Ok(Self::base(readings, config))
    }

    fn base(readings: Vec<HybridReading<D>>, config: SequentialConfig) -> Self {
        Self {
            readings,
            config,
            quality_scores: None,
            listener: None,
            locked: false,
            result: None,
        }
    }

    /// Minimum readings: the ranging stage dominates.
    pub fn min_readings(&self) -> usize {
        let radiated_min = (usize::from(self.config.estimate_tx_power)
            + usize::from(self.config.estimate_path_loss))
        .max(1);
        (D + 1).max(radiated_min)
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

    pub fn set_readings(&mut self, readings: Vec<HybridReading<D>>) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        self.readings = readings;
        Ok(())
    }

    pub fn set_config(&mut self, config: SequentialConfig) -> Result<(), EstimateError> {
        self.check_unlocked()?;
        config.validate()?;
        self.config = config;
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
        let needs_quality = c.position.method.requires_quality_scores()
            || c.radiated.method.requires_quality_scores();
        let quality_ok = !needs_quality
            || self
                .quality_scores
                .as_ref()
                .is_some_and(|q| q.len() == self.readings.len());
        let tx_power_ok = c.estimate_tx_power || c.initial_tx_power_dbm.is_some();
        quality_ok && tx_power_ok && self.readings.len() >= self.min_readings()
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

        self.result = Some(outcome?);
        Ok(())
    }

    fn run_locked(&mut self) -> Result<SequentialOutcome<D>, EstimateError> {
        let (ranges, rssis): (Vec<_>, Vec<_>) =
            self.readings.iter().map(|r| r.split()).unzip();

        // Stage 1: position from the range components.
        let mut position_stage =
            RobustRangingEstimator::with_config(ranges, self.config.position.clone())?;
        if let Some(scores) = &self.quality_scores {
            position_stage.set_quality_scores(Some(scores.clone()))?;
        }
        position_stage.estimate()?;
        let position = match position_stage.estimated_position() {
            Some(p) => *p,
            None => return Err(EstimateError::NoConsensus),
        };
        let position_covariance = position_stage.estimated_position_covariance().copied();
        let position_inliers = position_stage.inliers_data().cloned();
        log::debug!("sequential: position stage fixed {:?}", position);

        // Stage 2: radiated parameters with the position pinned.
        let rssi_config = RssiConfig {
            robust: self.config.radiated.clone(),
            estimate_position: false,
            estimate_tx_power: self.config.estimate_tx_power,
            estimate_path_loss: self.config.estimate_path_loss,
            initial_position: Some(position),
            initial_tx_power_dbm: self.config.initial_tx_power_dbm,
            initial_path_loss: self.config.initial_path_loss,
        };
        let mut radiated_stage = RobustRssiEstimator::with_config(rssis, rssi_config)?;
        if let Some(scores) = &self.quality_scores {
            radiated_stage.set_quality_scores(Some(scores.clone()))?;
        }
        radiated_stage.estimate()?;

        let combined_covariance = match (
            &position_covariance,
            radiated_stage.estimated_covariance(),
        ) {
            (Some(position_block), Some(radiated_block)) => {
                let size = D + radiated_block.nrows();
                let mut combined = DMatrix::zeros(size, size);
                for r in 0..D {
                    for c in 0..D {
                        combined[(r, c)] = position_block[(r, c)];
                    }
                }
                for r in 0..radiated_block.nrows() {
                    for c in 0..radiated_block.ncols() {
                        combined[(D + r, D + c)] = radiated_block[(r, c)];
                    }
                }
                Some(combined)
            }
            _ => None,
        };

        Ok(SequentialOutcome {
            position,
            position_covariance,
            tx_power_dbm: radiated_stage.estimated_tx_power_dbm(),
            tx_power_variance: radiated_stage.estimated_tx_power_variance(),
            path_loss_exponent: radiated_stage.estimated_path_loss_exponent(),
            path_loss_variance: radiated_stage.estimated_path_loss_variance(),
            combined_covariance,
            position_inliers,
            radiated_inliers: radiated_stage.inliers_data().cloned(),
        })
    }

    pub fn estimated_position(&self) -> Option<&PtN<D>> {
        self.result.as_ref().map(|r| &r.position)
    }

    pub fn estimated_position_covariance(&self) -> Option<&MatN<D>> {
        self.result.as_ref()?.position_covariance.as_ref()
    }

    pub fn estimated_tx_power_dbm(&self) -> Option<Real> {
        self.result.as_ref()?.tx_power_dbm
    }

    pub fn estimated_tx_power_variance(&self) -> Option<Real> {
        self.result.as_ref()?.tx_power_variance
    }

    pub fn estimated_path_loss_exponent(&self) -> Option<Real> {
        self.result.as_ref()?.path_loss_exponent
    }

    pub fn estimated_path_loss_variance(&self) -> Option<Real> {
        self.result.as_ref()?.path_loss_variance
    }

    /// Block-diagonal covariance over position and radiated
    /// parameters, when both stages produced one.
    pub fn estimated_covariance(&self) -> Option<&DMatrix<Real>> {
        self.result.as_ref()?.combined_covariance.as_ref()
    }

    pub fn position_inliers_data(&self) -> Option<&InliersData> {
        self.result.as_ref()?.position_inliers.as_ref()
    }

    pub fn radiated_inliers_data(&self) -> Option<&InliersData> {
        self.result.as_ref()?.radiated_inliers.as_ref()
    }

    pub fn readings(&self) -> &[HybridReading<D>] {
        &self.readings
    }

    pub fn config(&self) -> &SequentialConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rloc_core::math::{distance, Pt2};
    use rloc_core::propagation::{expected_rssi_dbm, free_space_constant};
    use rloc_core::robust::RobustMethod;
    use rloc_core::source::RadioSource;

    fn readings_for(target: &Pt2, tx_power: Real, path_loss: Real) -> Vec<HybridReading<2>> {
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
            let d = distance(p, target);
            HybridReading::new(
                RadioSource::new("ap", 2.4e9).unwrap(),
                *p,
                d,
                expected_rssi_dbm(k, d, tx_power, path_loss),
            )
            .unwrap()
        })
        .collect()
    }

    fn config() -> SequentialConfig {
        let mut config = SequentialConfig::default();
        config.position.method = RobustMethod::Ransac;
        config.position.threshold = 0.5;
        config.radiated.method = RobustMethod::Ransac;
        config.radiated.threshold = 1.0;
        config
    }

    #[test]
    fn estimates_position_then_power() {
        let target = Pt2::new(5.0, 5.0);
        let mut est =
            SequentialHybridEstimator::with_config(readings_for(&target, -12.0, 2.0), config())
                .unwrap();
        assert!(est.is_ready());
        est.estimate().unwrap();

        let p = est.estimated_position().unwrap();
        assert!(distance(p, &target) < 1e-4, "got {:?}", p);
        assert!((est.estimated_tx_power_dbm().unwrap() - -12.0).abs() < 1e-4);
        assert!(est.estimated_tx_power_variance().is_some());
        // Combined covariance: 2 position dims + 1 radiated parameter.
        let combined = est.estimated_covariance().unwrap();
        assert_eq!(combined.nrows(), 3);
        // Cross-terms between position and power are zero by
        // construction.
        assert_eq!(combined[(0, 2)], 0.0);
        assert_eq!(combined[(2, 0)], 0.0);
        assert!(est.position_inliers_data().is_some());
        assert!(est.radiated_inliers_data().is_some());
    }

    #[test]
    fn stage_failure_commits_nothing() {
        // Collinear receivers: every position subset is degenerate.
        let k = free_space_constant(2.4e9);
        let readings: Vec<HybridReading<2>> = (0..5)
            .map(|i| {
                HybridReading::new(
                    RadioSource::new("ap", 2.4e9).unwrap(),
                    Pt2::new(i as Real, 0.0),
                    1.0,
                    expected_rssi_dbm(k, 1.0, -12.0, 2.0),
                )
                .unwrap()
            })
            .collect();
        let mut est = SequentialHybridEstimator::with_config(readings, config()).unwrap();
        assert!(est.is_ready());
        assert_eq!(est.estimate(), Err(EstimateError::NoConsensus));
        assert!(est.estimated_position().is_none());
        assert!(est.estimated_tx_power_dbm().is_none());
        assert!(est.estimated_covariance().is_none());
        assert!(!est.is_locked());
    }
}
