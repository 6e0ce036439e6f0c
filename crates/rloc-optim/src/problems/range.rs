//! Non-linear range lateration with covariance.
//!
//! Residual per sample: `(|x − p_i| − d_i) / σ_i`. The Jacobian row is
//! the unit direction from receiver to the current position estimate,
//! scaled by the weight.

use crate::{covariance_at, FitError, LmBackend, NllsProblem, NllsSolverBackend, SolveOptions,
            SolveReport};
use nalgebra::{DMatrix, DVector};
use rloc_core::math::{MatN, PtN, Real};

/// One distance observation with its weight.
#[derive(Debug, Clone)]
pub struct RangeSample<const D: usize> {
    pub position: PtN<D>,
    pub distance: Real,
    /// Standard deviation of the distance measurement; 1.0 when unknown.
    pub std_dev: Real,
}

struct RangeProblem<'a, const D: usize> {
    samples: &'a [RangeSample<D>],
}

impl<'a, const D: usize> NllsProblem for RangeProblem<'a, D> {
    fn num_params(&self) -> usize {
        D
    }

    fn num_residuals(&self) -> usize {
        self.samples.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        DVector::from_iterator(
            self.samples.len(),
            self.samples.iter().map(|s| {
                let mut sq = 0.0;
                for j in 0..D {
                    let diff = x[j] - s.position[j];
                    sq += diff * diff;
                }
                (sq.sqrt() - s.distance) / s.std_dev
            }),
        )
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let mut jac = DMatrix::zeros(self.samples.len(), D);
        for (i, s) in self.samples.iter().enumerate() {
            let mut sq = 0.0;
            for j in 0..D {
                let diff = x[j] - s.position[j];
                sq += diff * diff;
            }
            let dist = sq.sqrt().max(1e-12);
            for j in 0..D {
                jac[(i, j)] = (x[j] - s.position[j]) / (dist * s.std_dev);
            }
        }
        jac
    }
}

/// Refined position estimate.
#[derive(Debug, Clone)]
pub struct PositionFit<const D: usize> {
    pub position: PtN<D>,
    /// Position covariance, when requested and available.
    pub covariance: Option<MatN<D>>,
    pub report: SolveReport,
}

/// Fit an emitter position to distance observations, seeded at
/// `initial`.
pub fn fit_position<const D: usize>(
    samples: &[RangeSample<D>],
    initial: &PtN<D>,
    opts: &SolveOptions,
    want_covariance: bool,
) -> Result<PositionFit<D>, FitError> {
    let needed = D + 1;
    if samples.len() < needed {
        return Err(FitError::NotEnoughSamples {
            needed,
            got: samples.len(),
        });
    }

    let problem = RangeProblem { samples };
    let x0 = DVector::from_iterator(D, initial.coords.iter().copied());
    let (x_opt, report) = LmBackend.solve(&problem, x0, opts);
    if !report.converged {
        return Err(FitError::NotConverged);
    }

    let covariance = if want_covariance {
        covariance_at(&problem, &x_opt).map(|cov| {
            let mut out = MatN::<D>::zeros();
            for r in 0..D {
                for c in 0..D {
                    out[(r, c)] = cov[(r, c)];
                }
            }
            out
        })
    } else {
        None
    };

    let mut position = PtN::<D>::origin();
    for j in 0..D {
        position[j] = x_opt[j];
    }

    Ok(PositionFit {
        position,
        covariance,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rloc_core::math::{distance, Pt2};

    fn samples_for(target: &Pt2, noise: &[Real]) -> Vec<RangeSample<2>> {
        let anchors = [
            Pt2::new(0.0, 0.0),
            Pt2::new(10.0, 0.0),
            Pt2::new(10.0, 10.0),
            Pt2::new(0.0, 10.0),
            Pt2::new(5.0, 0.0),
        ];
        anchors
            .iter()
            .zip(noise)
            .map(|(a, &eps)| RangeSample {
                position: *a,
                distance: distance(a, target) + eps,
                std_dev: 0.1,
            })
            .collect()
    }

    #[test]
    fn recovers_exact_position() {
        let target = Pt2::new(5.0, 5.0);
        let samples = samples_for(&target, &[0.0; 5]);
        let fit = fit_position(&samples, &Pt2::new(4.0, 6.0), &SolveOptions::default(), true)
            .unwrap();
        assert!(distance(&fit.position, &target) < 1e-8, "got {:?}", fit.position);
        let cov = fit.covariance.expect("covariance requested");
        assert!(cov[(0, 0)] >= 0.0 && cov[(1, 1)] >= 0.0);
        assert!((cov[(0, 1)] - cov[(1, 0)]).abs() < 1e-12);
    }

    #[test]
    fn tolerates_small_noise() {
        let target = Pt2::new(3.0, 7.0);
        let samples = samples_for(&target, &[0.02, -0.01, 0.015, -0.02, 0.01]);
        let fit = fit_position(&samples, &Pt2::new(5.0, 5.0), &SolveOptions::default(), false)
            .unwrap();
        assert!(distance(&fit.position, &target) < 0.1);
        assert!(fit.covariance.is_none());
    }

    #[test]
    fn rejects_too_few_samples() {
        let target = Pt2::new(5.0, 5.0);
        let samples = samples_for(&target, &[0.0; 5]);
        let err = fit_position(&samples[..2], &target, &SolveOptions::default(), false);
        assert!(matches!(
            err,
            Err(FitError::NotEnoughSamples { needed: 3, got: 2 })
        ));
    }
}
