//! Estimator configuration values.
//!
//! One config struct per estimator replaces a factory-overload
//! explosion: build the value, then hand it to the estimator's
//! constructor. Consensus knobs shared by every estimator live in
//! [`RobustConfig`]; modality-specific extras wrap it.

use crate::error::EstimateError;
use rloc_core::math::{PtN, Real};
use rloc_core::propagation::DEFAULT_PATH_LOSS_EXPONENT;
use rloc_core::robust::{RobustMethod, RobustOptions};
use serde::{Deserialize, Serialize};

/// Consensus configuration shared by all robust estimators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustConfig {
    /// Consensus method; defaults to PROMedS.
    pub method: RobustMethod,
    pub max_iterations: usize,
    /// Desired confidence in `[0, 1)`.
    pub confidence: Real,
    /// Inlier residual threshold (RANSAC/MSAC/PROSAC).
    pub threshold: Real,
    /// Early-stop bound on the best median (LMedS/PROMedS); 0 disables.
    pub stop_threshold: Real,
    /// Reporting-only multiplier on the robust scale used to derive
    /// LMedS/PROMedS inlier masks.
    pub inlier_factor: Real,
    /// Subset size for preliminary fits; raised to the estimator
    /// minimum when smaller. 0 means minimal subsets.
    pub preliminary_subset_size: usize,
    /// Minimum progress change between two progress notifications.
    pub progress_delta: Real,
    /// Re-fit the winning estimate on its inliers.
    pub refine: bool,
    /// Compute and keep the covariance of the refined estimate.
    pub keep_covariance: bool,
    /// Seed of the sampling RNG; fixed seed makes runs reproducible.
    pub seed: u64,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            method: RobustMethod::default(),
            max_iterations: 5000,
            confidence: 0.99,
            threshold: 1.0,
            stop_threshold: 0.0,
            inlier_factor: 2.5,
            preliminary_subset_size: 0,
            progress_delta: 0.05,
            refine: true,
            keep_covariance: true,
            seed: 1_234_567,
        }
    }
}

impl RobustConfig {
    pub(crate) fn validate(&self) -> Result<(), EstimateError> {
        validate_threshold(self.threshold)?;
        validate_confidence(self.confidence)?;
        validate_max_iterations(self.max_iterations)?;
        if !(self.stop_threshold >= 0.0) {
            return Err(EstimateError::InvalidConfig(
                "stop threshold must be non-negative",
            ));
        }
        if !(self.inlier_factor > 0.0) {
            return Err(EstimateError::InvalidConfig(
                "inlier factor must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.progress_delta) {
            return Err(EstimateError::InvalidConfig(
                "progress delta must be within [0, 1]",
            ));
        }
        Ok(())
    }

    pub(crate) fn to_options(&self) -> RobustOptions {
        RobustOptions {
            max_iterations: self.max_iterations,
            confidence: self.confidence,
            threshold: self.threshold,
            stop_threshold: self.stop_threshold,
            inlier_factor: self.inlier_factor,
            subset_size: self.preliminary_subset_size,
            progress_delta: self.progress_delta,
            seed: self.seed,
        }
    }
}

pub(crate) fn validate_threshold(threshold: Real) -> Result<(), EstimateError> {
    if threshold.is_finite() && threshold > 0.0 {
        Ok(())
    } else {
        Err(EstimateError::InvalidConfig("threshold must be positive"))
    }
}

pub(crate) fn validate_confidence(confidence: Real) -> Result<(), EstimateError> {
    if (0.0..1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(EstimateError::InvalidConfig(
            "confidence must be within [0, 1)",
        ))
    }
}

pub(crate) fn validate_max_iterations(max_iterations: usize) -> Result<(), EstimateError> {
    if max_iterations >= 1 {
        Ok(())
    } else {
        Err(EstimateError::InvalidConfig(
            "at least one iteration is required",
        ))
    }
}

pub(crate) fn validate_path_loss(path_loss: Real) -> Result<(), EstimateError> {
    if path_loss.is_finite() && path_loss > 0.0 {
        Ok(())
    } else {
        Err(EstimateError::InvalidConfig(
            "path-loss exponent must be positive",
        ))
    }
}

/// Configuration of the RSSI estimator.
#[derive(Debug, Clone)]
pub struct RssiConfig<const D: usize> {
    pub robust: RobustConfig,
    /// Estimate the emitter position; disable to pin it at
    /// `initial_position` (the sequential orchestrator does this).
    pub estimate_position: bool,
    pub estimate_tx_power: bool,
    pub estimate_path_loss: bool,
    /// Required when position estimation is disabled.
    pub initial_position: Option<PtN<D>>,
    /// Seed/pinned transmitted power. Required when estimating the
    /// position (preliminary fits convert RSSI to distance with it) and
    /// when transmitted power is pinned.
    pub initial_tx_power_dbm: Option<Real>,
    /// Seed/pinned path-loss exponent.
    pub initial_path_loss: Real,
}

impl<const D: usize> Default for RssiConfig<D> {
    fn default() -> Self {
        Self {
            robust: RobustConfig::default(),
            estimate_position: true,
            estimate_tx_power: true,
            estimate_path_loss: false,
            initial_position: None,
            initial_tx_power_dbm: None,
            initial_path_loss: DEFAULT_PATH_LOSS_EXPONENT,
        }
    }
}

impl<const D: usize> RssiConfig<D> {
    pub(crate) fn validate(&self) -> Result<(), EstimateError> {
        self.robust.validate()?;
        validate_path_loss(self.initial_path_loss)?;
        if !(self.estimate_position || self.estimate_tx_power || self.estimate_path_loss) {
            return Err(EstimateError::InvalidConfig(
                "at least one parameter must be estimated",
            ));
        }
        Ok(())
    }
}

/// Configuration of the hybrid estimator. The position is always
/// estimated (from the range component of the readings).
#[derive(Debug, Clone)]
pub struct HybridConfig {
    pub robust: RobustConfig,
    pub estimate_tx_power: bool,
    pub estimate_path_loss: bool,
    /// Pinned transmitted power when not estimated.
    pub initial_tx_power_dbm: Option<Real>,
    /// Seed/pinned path-loss exponent.
    pub initial_path_loss: Real,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            robust: RobustConfig::default(),
            estimate_tx_power: true,
            estimate_path_loss: false,
            initial_tx_power_dbm: None,
            initial_path_loss: DEFAULT_PATH_LOSS_EXPONENT,
        }
    }
}

impl HybridConfig {
    pub(crate) fn validate(&self) -> Result<(), EstimateError> {
        self.robust.validate()?;
        validate_path_loss(self.initial_path_loss)
    }
}

/// Configuration of the sequential position-then-power orchestrator.
#[derive(Debug, Clone)]
pub struct SequentialConfig {
    /// Consensus configuration of the ranging (position) stage.
    pub position: RobustConfig,
    /// Consensus configuration of the RSSI (radiated-parameter) stage.
    pub radiated: RobustConfig,
    pub estimate_tx_power: bool,
    pub estimate_path_loss: bool,
    pub initial_tx_power_dbm: Option<Real>,
    pub initial_path_loss: Real,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self {
            position: RobustConfig::default(),
            radiated: RobustConfig::default(),
            estimate_tx_power: true,
            estimate_path_loss: false,
            initial_tx_power_dbm: None,
            initial_path_loss: DEFAULT_PATH_LOSS_EXPONENT,
        }
    }
}

impl SequentialConfig {
    pub(crate) fn validate(&self) -> Result<(), EstimateError> {
        self.position.validate()?;
        self.radiated.validate()?;
        validate_path_loss(self.initial_path_loss)?;
        if !(self.estimate_tx_power || self.estimate_path_loss) {
            return Err(EstimateError::InvalidConfig(
                "the radiated stage must estimate at least one parameter",
            ));
        }
        Ok(())
    }
}
