//! Robust estimation over readings that carry both a distance and an
//! RSSI measurement.
//!
//! One consensus run: preliminary fits laterate the position from the
//! range component (well conditioned) and solve the radiated
//! parameters from the RSSI component given that position. Candidates
//! are scored in the RSSI domain.

use crate::config::{validate_path_loss, validate_threshold, HybridConfig};
use crate::error::EstimateError;
use crate::listener::EstimateListener;
use crate::refine;
use crate::runner;
use nalgebra::DMatrix;
use rloc_core::math::{distance, MatN, PtN, Real};
use rloc_core::propagation::rssi_predictor;
use rloc_core::reading::HybridReading;
use rloc_core::robust::{Estimator, InliersData, RobustMethod};
use rloc_core::Estimate;
use rloc_linear::{fit_rssi_params, solve_inhomogeneous};
use rloc_optim::RssiSample;

struct HybridConsensusProblem<const D: usize> {
    estimate_tx_power: bool,
    estimate_path_loss: bool,
    initial_tx_power_dbm: Real,
    initial_path_loss: Real,
}

impl<const D: usize> Estimator for HybridConsensusProblem<D> {
    type Datum = HybridReading<D>;
    type Model = Estimate<D>;

    fn min_samples(&self) -> usize {
        D + 1 + usize::from(self.estimate_tx_power) + usize::from(self.estimate_path_loss)
    }

    fn fit(&self, data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        let positions: Vec<PtN<D>> = sample.iter().map(|&i| data[i].position).collect();
        let distances: Vec<Real> = sample.iter().map(|&i| data[i].distance).collect();
        let position = solve_inhomogeneous(&positions, &distances).ok()?;

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

/// Robust estimator over hybrid readings: position from the range
/// component, radiated parameters from the RSSI component.
pub struct RobustHybridEstimator<const D: usize> {
    readings: Vec<HybridReading<D>>,
    config: HybridConfig,
    quality_scores: Option<Vec<Real>>,
    listener: Option<Box<dyn EstimateListener>>,
    locked: bool,
    estimated: Option<Estimate<D>>,
    position_covariance: Option<MatN<D>>,
    tx_power_variance: Option<Real>,
    path_loss_variance: Option<Real>,
    inliers_data: Option<InliersData>,
}

pub type RobustHybridEstimator2D = RobustHybridEstimator<2>;
pub type RobustHybridEstimator3D = RobustHybridEstimator<3>;

impl<const D: usize> RobustHybridEstimator<D> {
    pub fn new(readings: Vec<HybridReading<D>>) -> Self {
        Self::base(readings, HybridConfig::default())
    }

    pub fn with_config(
        readings: Vec<HybridReading<D>>,
        config: HybridConfig,
    ) -> Result<Self, EstimateError> {
        config.validate()?;
        Ok(Self::base(readings, config))
    }

    fn base(readings: Vec<HybridReading<D>>, config: HybridConfig) -> Self {
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
            inliers_data: None,
        }
    }

    pub fn min_readings(&self) -> usize {
        D + 1
            + usize::from(self.config.estimate_tx_power)
            + usize::from(self.config.estimate_path_loss)
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

    pub fn set_config(&mut self, config: HybridConfig) -> Result<(), EstimateError> {
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
        let quality_ok = !c.robust.method.requires_quality_scores()
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

        let (estimate, position_cov, tx_var, pl_var, inliers) = outcome?;
        self.estimated = Some(estimate);
        self.position_covariance = position_cov;
        self.tx_power_variance = tx_var;
        self.path_loss_variance = pl_var;
        self.inliers_data = Some(inliers);
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn run_locked(
        &mut self,
    ) -> Result<
        (
            Estimate<D>,
            Option<MatN<D>>,
            Option<Real>,
            Option<Real>,
            InliersData,
        ),
        EstimateError,
    > {
        let config = self.config.clone();
        let problem = HybridConsensusProblem::<D> {
            estimate_tx_power: config.estimate_tx_power,
            estimate_path_loss: config.estimate_path_loss,
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

        // Two-stage refinement mirroring the fit primitive: position on
        // the range component, radiated parameters on the RSSI
        // component with the refined position pinned.
        let ranges: Vec<_> = self.readings.iter().map(|r| r.split().0).collect();
        let (position, position_cov) =
            refine::refine_position(&ranges, &inliers, &model.position, &config.robust);

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
        let seeded = Estimate::new(position, model.tx_power_dbm, model.path_loss_exponent);
        let radiated = refine::refine_rssi(
            &samples,
            &inliers.mask,
            &seeded,
            false,
            config.estimate_tx_power,
            config.estimate_path_loss,
            &config.robust,
        );

        let estimate = Estimate::new(
            position,
            radiated.estimate.tx_power_dbm,
            radiated.estimate.path_loss_exponent,
        );
        Ok((
            estimate,
            position_cov,
            radiated.tx_power_variance,
            radiated.path_loss_variance,
            inliers,
        ))
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

    /// Block-diagonal covariance of position and radiated parameters,
    /// when both blocks are available.
    pub fn estimated_covariance(&self) -> Option<DMatrix<Real>> {
        let position = self.position_covariance.as_ref()?;
        let mut diag = Vec::new();
        if let Some(v) = self.tx_power_variance {
            diag.push(v);
        }
        if let Some(v) = self.path_loss_variance {
            diag.push(v);
        }
        let size = D + diag.len();
        let mut out = DMatrix::zeros(size, size);
        for r in 0..D {
            for c in 0..D {
                out[(r, c)] = position[(r, c)];
            }
        }
        for (i, v) in diag.iter().enumerate() {
            out[(D + i, D + i)] = *v;
        }
        Some(out)
    }

    pub fn inliers_data(&self) -> Option<&InliersData> {
        self.inliers_data.as_ref()
    }

    pub fn readings(&self) -> &[HybridReading<D>] {
        &self.readings
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }
}
