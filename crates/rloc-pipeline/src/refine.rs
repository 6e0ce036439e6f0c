//! Refinement stage: re-fit the winning consensus estimate on its
//! inliers and partition the resulting covariance.
//!
//! Refinement failure is always recoverable — callers get the
//! unrefined estimate back with covariance cleared, never an error.

use crate::config::RobustConfig;
use nalgebra::DMatrix;
use rloc_core::math::{MatN, PtN, Real};
use rloc_core::propagation::DEFAULT_PATH_LOSS_EXPONENT;
use rloc_core::reading::RangeReading;
use rloc_core::robust::InliersData;
use rloc_core::Estimate;
use rloc_optim::{fit_position, fit_rssi, RangeSample, RssiFitSpec, RssiSample, SolveOptions};

/// Re-fit a position on the inlier distance readings.
pub(crate) fn refine_position<const D: usize>(
    readings: &[RangeReading<D>],
    inliers: &InliersData,
    seed: &PtN<D>,
    config: &RobustConfig,
) -> (PtN<D>, Option<MatN<D>>) {
    if !config.refine {
        return (*seed, None);
    }

    let samples: Vec<RangeSample<D>> = readings
        .iter()
        .zip(inliers.mask.iter())
        .filter(|(_, &inlier)| inlier)
        .map(|(r, _)| RangeSample {
            position: r.position,
            distance: r.distance,
            std_dev: r.distance_std_dev.unwrap_or(1.0),
        })
        .collect();

    match fit_position(&samples, seed, &SolveOptions::default(), config.keep_covariance) {
        Ok(fit) => (fit.position, fit.covariance),
        Err(err) => {
            log::debug!("position refinement failed: {err}; keeping consensus estimate");
            (*seed, None)
        }
    }
}

/// Refined propagation-model estimate with its covariance blocks.
pub(crate) struct RadiatedRefineOutcome<const D: usize> {
    pub estimate: Estimate<D>,
    pub position_covariance: Option<MatN<D>>,
    pub tx_power_variance: Option<Real>,
    pub path_loss_variance: Option<Real>,
    /// Full covariance of the active parameter vector (position dims
    /// first, then power, then path loss).
    pub active_covariance: Option<DMatrix<Real>>,
}

impl<const D: usize> RadiatedRefineOutcome<D> {
    fn unrefined(winning: &Estimate<D>) -> Self {
        Self {
            estimate: winning.clone(),
            position_covariance: None,
            tx_power_variance: None,
            path_loss_variance: None,
            active_covariance: None,
        }
    }
}

/// Re-fit the propagation model on the inlier RSSI samples, seeded
/// with the winning estimate and the same enable flags.
pub(crate) fn refine_rssi<const D: usize>(
    samples: &[RssiSample<D>],
    mask: &[bool],
    winning: &Estimate<D>,
    estimate_position: bool,
    estimate_tx_power: bool,
    estimate_path_loss: bool,
    config: &RobustConfig,
) -> RadiatedRefineOutcome<D> {
    if !config.refine {
        return RadiatedRefineOutcome::unrefined(winning);
    }

    let subset: Vec<RssiSample<D>> = samples
        .iter()
        .zip(mask.iter())
        .filter(|(_, &inlier)| inlier)
        .map(|(s, _)| s.clone())
        .collect();

    let spec = RssiFitSpec {
        estimate_position,
        estimate_tx_power,
        estimate_path_loss,
        initial_position: winning.position,
        initial_tx_power_dbm: winning.tx_power_or(0.0),
        initial_path_loss: winning.path_loss_or(DEFAULT_PATH_LOSS_EXPONENT),
    };

    match fit_rssi(&subset, &spec, &SolveOptions::default(), config.keep_covariance) {
        Ok(fit) => {
            let mut outcome = RadiatedRefineOutcome {
                estimate: Estimate::new(
                    fit.position,
                    Some(fit.tx_power_dbm),
                    Some(fit.path_loss_exponent),
                ),
                position_covariance: None,
                tx_power_variance: None,
                path_loss_variance: None,
                active_covariance: None,
            };
            if let Some(cov) = fit.covariance {
                if estimate_position {
                    let mut block = MatN::<D>::zeros();
                    for r in 0..D {
                        for c in 0..D {
                            block[(r, c)] = cov[(r, c)];
                        }
                    }
                    outcome.position_covariance = Some(block);
                }
                outcome.tx_power_variance = spec.tx_power_index().map(|i| cov[(i, i)]);
                outcome.path_loss_variance = spec.path_loss_index().map(|i| cov[(i, i)]);
                outcome.active_covariance = Some(cov);
            }
            outcome
        }
        Err(err) => {
            log::debug!("RSSI refinement failed: {err}; keeping consensus estimate");
            RadiatedRefineOutcome::unrefined(winning)
        }
    }
}
