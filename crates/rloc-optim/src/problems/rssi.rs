//! Non-linear fit of the isotropic propagation model to RSSI
//! observations.
//!
//! The active parameter set is controlled by enable flags; pinned
//! parameters keep their initial value. Parameters are packed position
//! first, then transmitted power, then path-loss exponent, so the
//! covariance of the active set can be partitioned by diagonal offset.

use crate::{covariance_at, FitError, LmBackend, NllsProblem, NllsSolverBackend, SolveOptions,
            SolveReport};
use nalgebra::{DMatrix, DVector};
use rloc_core::math::{PtN, Real};
use std::f64::consts::LN_10;

/// One RSSI observation with its weight and the free-space constant of
/// its source.
#[derive(Debug, Clone)]
pub struct RssiSample<const D: usize> {
    pub position: PtN<D>,
    pub rssi_dbm: Real,
    /// Free-space constant `k = c / (4π·f)` of the source.
    pub k: Real,
    /// Standard deviation of the RSSI measurement; 1.0 when unknown.
    pub std_dev: Real,
}

/// Which parameters to estimate and where to start from.
#[derive(Debug, Clone)]
pub struct RssiFitSpec<const D: usize> {
    pub estimate_position: bool,
    pub estimate_tx_power: bool,
    pub estimate_path_loss: bool,
    pub initial_position: PtN<D>,
    pub initial_tx_power_dbm: Real,
    pub initial_path_loss: Real,
}

impl<const D: usize> RssiFitSpec<D> {
    /// Size of the active parameter vector.
    pub fn num_params(&self) -> usize {
        (if self.estimate_position { D } else { 0 })
            + usize::from(self.estimate_tx_power)
            + usize::from(self.estimate_path_loss)
    }

    /// Diagonal offset of the transmitted-power variance in the active
    /// covariance, when estimated.
    pub fn tx_power_index(&self) -> Option<usize> {
        self.estimate_tx_power
            .then(|| if self.estimate_position { D } else { 0 })
    }

    /// Diagonal offset of the path-loss variance in the active
    /// covariance, when estimated.
    pub fn path_loss_index(&self) -> Option<usize> {
        self.estimate_path_loss.then(|| {
            (if self.estimate_position { D } else { 0 }) + usize::from(self.estimate_tx_power)
        })
    }

    fn pack_initial(&self) -> DVector<Real> {
        let mut x = DVector::zeros(self.num_params());
        let mut idx = 0;
        if self.estimate_position {
            for j in 0..D {
                x[idx] = self.initial_position[j];
                idx += 1;
            }
        }
        if self.estimate_tx_power {
            x[idx] = self.initial_tx_power_dbm;
            idx += 1;
        }
        if self.estimate_path_loss {
            x[idx] = self.initial_path_loss;
        }
        x
    }

    fn unpack(&self, x: &DVector<Real>) -> (PtN<D>, Real, Real) {
        let mut idx = 0;
        let mut position = self.initial_position;
        if self.estimate_position {
            for j in 0..D {
                position[j] = x[idx];
                idx += 1;
            }
        }
        let tx_power = if self.estimate_tx_power {
            let v = x[idx];
            idx += 1;
            v
        } else {
            self.initial_tx_power_dbm
        };
        let path_loss = if self.estimate_path_loss {
            x[idx]
        } else {
            self.initial_path_loss
        };
        (position, tx_power, path_loss)
    }
}

struct RssiProblem<'a, const D: usize> {
    samples: &'a [RssiSample<D>],
    spec: &'a RssiFitSpec<D>,
}

impl<'a, const D: usize> RssiProblem<'a, D> {
    fn geometry(&self, position: &PtN<D>, sample: &RssiSample<D>) -> (Real, Real) {
        let mut sq = 0.0;
        for j in 0..D {
            let diff = position[j] - sample.position[j];
            sq += diff * diff;
        }
        let dist = sq.sqrt().max(1e-12);
        let predictor = 10.0 * (sample.k / dist).log10();
        (dist, predictor)
    }
}

impl<'a, const D: usize> NllsProblem for RssiProblem<'a, D> {
    fn num_params(&self) -> usize {
        self.spec.num_params()
    }

    fn num_residuals(&self) -> usize {
        self.samples.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let (position, tx_power, path_loss) = self.spec.unpack(x);
        DVector::from_iterator(
            self.samples.len(),
            self.samples.iter().map(|s| {
                let (_, predictor) = self.geometry(&position, s);
                let expected = tx_power + path_loss * predictor;
                (s.rssi_dbm - expected) / s.std_dev
            }),
        )
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let (position, _, path_loss) = self.spec.unpack(x);
        let mut jac = DMatrix::zeros(self.samples.len(), self.num_params());
        for (i, s) in self.samples.iter().enumerate() {
            let (dist, predictor) = self.geometry(&position, s);
            let mut col = 0;
            if self.spec.estimate_position {
                // d(residual)/d(pos_j) = 10·n/(ln10·σ)·(pos_j − p_ij)/d²
                let scale = 10.0 * path_loss / (LN_10 * s.std_dev * dist * dist);
                for j in 0..D {
                    jac[(i, col)] = scale * (position[j] - s.position[j]);
                    col += 1;
                }
            }
            if self.spec.estimate_tx_power {
                jac[(i, col)] = -1.0 / s.std_dev;
                col += 1;
            }
            if self.spec.estimate_path_loss {
                jac[(i, col)] = -predictor / s.std_dev;
            }
        }
        jac
    }
}

/// Refined propagation-model estimate over the active parameters.
#[derive(Debug, Clone)]
pub struct RssiFit<const D: usize> {
    pub position: PtN<D>,
    pub tx_power_dbm: Real,
    pub path_loss_exponent: Real,
    /// Covariance of the active parameter vector (position dims first,
    /// then power, then path loss), when requested and available.
    pub covariance: Option<DMatrix<Real>>,
    pub report: SolveReport,
}

/// Fit the propagation model to RSSI observations per `spec`.
pub fn fit_rssi<const D: usize>(
    samples: &[RssiSample<D>],
    spec: &RssiFitSpec<D>,
    opts: &SolveOptions,
    want_covariance: bool,
) -> Result<RssiFit<D>, FitError> {
    let num_params = spec.num_params();
    if num_params == 0 {
        return Err(FitError::NothingToEstimate);
    }
    if samples.len() < num_params {
        return Err(FitError::NotEnoughSamples {
            needed: num_params,
            got: samples.len(),
        });
    }

    let problem = RssiProblem { samples, spec };
    let (x_opt, report) = LmBackend.solve(&problem, spec.pack_initial(), opts);
    if !report.converged {
        return Err(FitError::NotConverged);
    }

    let covariance = if want_covariance {
        covariance_at(&problem, &x_opt)
    } else {
        None
    };

    let (position, tx_power_dbm, path_loss_exponent) = spec.unpack(&x_opt);
    Ok(RssiFit {
        position,
        tx_power_dbm,
        path_loss_exponent,
        covariance,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rloc_core::math::{distance, Pt2};
    use rloc_core::propagation::{expected_rssi_dbm, free_space_constant};

    fn samples_around(target: &Pt2, tx_power: Real, path_loss: Real) -> Vec<RssiSample<2>> {
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
        .map(|p| RssiSample {
            position: *p,
            rssi_dbm: expected_rssi_dbm(k, distance(p, target), tx_power, path_loss),
            k,
            std_dev: 1.0,
        })
        .collect()
    }

    #[test]
    fn recovers_radiated_parameters_with_pinned_position() {
        let target = Pt2::new(5.0, 5.0);
        let samples = samples_around(&target, -10.0, 2.3);
        let spec = RssiFitSpec {
            estimate_position: false,
            estimate_tx_power: true,
            estimate_path_loss: true,
            initial_position: target,
            initial_tx_power_dbm: 0.0,
            initial_path_loss: 2.0,
        };
        let fit = fit_rssi(&samples, &spec, &SolveOptions::default(), true).unwrap();
        assert!((fit.tx_power_dbm - -10.0).abs() < 1e-6, "pte {}", fit.tx_power_dbm);
        assert!((fit.path_loss_exponent - 2.3).abs() < 1e-6);
        let cov = fit.covariance.expect("covariance requested");
        assert_eq!(cov.nrows(), 2);
        assert_eq!(spec.tx_power_index(), Some(0));
        assert_eq!(spec.path_loss_index(), Some(1));
    }

    #[test]
    fn recovers_full_model_from_good_seed() {
        let target = Pt2::new(4.0, 6.0);
        let samples = samples_around(&target, -12.0, 2.0);
        let spec = RssiFitSpec {
            estimate_position: true,
            estimate_tx_power: true,
            estimate_path_loss: false,
            initial_position: Pt2::new(4.5, 5.5),
            initial_tx_power_dbm: -11.0,
            initial_path_loss: 2.0,
        };
        let fit = fit_rssi(&samples, &spec, &SolveOptions::default(), true).unwrap();
        assert!(distance(&fit.position, &target) < 1e-5, "got {:?}", fit.position);
        assert!((fit.tx_power_dbm - -12.0).abs() < 1e-4);
        assert_eq!(fit.path_loss_exponent, 2.0);
        assert_eq!(spec.tx_power_index(), Some(2));
        assert_eq!(spec.path_loss_index(), None);
        assert_eq!(fit.covariance.unwrap().nrows(), 3);
    }

    #[test]
    fn nothing_to_estimate_is_an_error() {
        let target = Pt2::new(5.0, 5.0);
        let samples = samples_around(&target, -10.0, 2.0);
        let spec = RssiFitSpec {
            estimate_position: false,
            estimate_tx_power: false,
            estimate_path_loss: false,
            initial_position: target,
            initial_tx_power_dbm: -10.0,
            initial_path_loss: 2.0,
        };
        assert!(matches!(
            fit_rssi(&samples, &spec, &SolveOptions::default(), false),
            Err(FitError::NothingToEstimate)
        ));
    }
}
